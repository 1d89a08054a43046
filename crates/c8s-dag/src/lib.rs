//! DAG builder & matrix expander (component 1): pure functions over a
//! pipeline specification, no I/O. Produces execution layers and matrix run
//! specifications.

pub mod conditional;
pub mod graph;
pub mod matrix;
pub mod substitute;

use std::collections::HashSet;

use c8s_core::crds::{MatrixSpec, Step};
use c8s_core::Error;

pub use graph::{Layer, Node};
pub use matrix::Binding;

/// A fully planned pipeline: the post-substitution, branch-filtered steps
/// (keyed by name) plus their layered execution order. Steps excluded by
/// `conditional.branch` are omitted from `steps`/`layers` entirely, not
/// merely marked Skipped (DESIGN.md Open Question decision) — their names
/// are recorded in `excluded` so a caller can still report them as
/// `StepPhase::Skipped` in status.
#[derive(Debug, Clone)]
pub struct Plan {
    pub layers: Vec<Layer>,
    pub steps: Vec<Step>,
    pub excluded: HashSet<String>,
}

impl Plan {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Build a `Plan` from a step sequence for a single run: apply matrix
/// substitution (if `binding` is non-empty), filter by `conditional.branch`
/// against `branch`, then build the layered DAG over what remains.
pub fn plan(steps: &[Step], binding: &Binding, branch: &str) -> Result<Plan, Error> {
    let substituted: Vec<Step> = steps.iter().map(|s| substitute_step(s, binding)).collect();

    let filter_inputs: Vec<conditional::FilterInput<'_>> = substituted
        .iter()
        .map(|s| conditional::FilterInput {
            name: &s.name,
            depends_on: &s.depends_on,
            branch_pattern: s.conditional.as_ref().and_then(|c| c.branch.as_deref()),
        })
        .collect();
    let excluded = conditional::excluded_steps(&filter_inputs, branch)?;

    let included: Vec<Step> = substituted
        .into_iter()
        .filter(|s| !excluded.contains(&s.name))
        .collect();

    let nodes: Vec<Node> = included
        .iter()
        .map(|s| Node {
            name: s.name.clone(),
            depends_on: s.depends_on.clone(),
        })
        .collect();

    let layers = graph::build_layers(&nodes)?;

    Ok(Plan {
        layers,
        steps: included,
        excluded,
    })
}

/// Apply `${{matrix.K}}`/`${matrix.K}` substitution to a step's name,
/// image, and commands (section 4.1's "any other textual field designated
/// as substitutable").
pub fn substitute_step(step: &Step, binding: &Binding) -> Step {
    let mut out = step.clone();
    out.name = substitute::interpolate(&step.name, binding);
    out.image = substitute::interpolate(&step.image, binding);
    out.commands = substitute::interpolate_vec(&step.commands, binding);
    out
}

/// Expand a PipelineConfig's `matrix` into the deterministic sequence of
/// bindings (section 4.1). Returns a single empty binding when no matrix is
/// declared, so callers can treat matrix and non-matrix configs uniformly.
pub fn expand_matrix(matrix: Option<&MatrixSpec>) -> Result<Vec<Binding>, Error> {
    match matrix {
        None => Ok(vec![Binding::new()]),
        Some(spec) => matrix::expand(&spec.dimensions, &spec.exclude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c8s_core::crds::ResourceRequirements;

    fn step(name: &str, deps: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            image: "alpine".to_string(),
            commands: vec!["echo hi".to_string()],
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            resources: ResourceRequirements::default(),
            timeout: None,
            artifacts: vec![],
            secrets: vec![],
            conditional: None,
        }
    }

    #[test]
    fn plans_linear_pipeline() {
        let steps = vec![step("build", &[]), step("test", &["build"])];
        let p = plan(&steps, &Binding::new(), "main").unwrap();
        assert_eq!(p.layers.len(), 2);
        assert_eq!(p.steps.len(), 2);
    }

    #[test]
    fn matrix_with_one_dimension_one_value_yields_one_run_empty_binding_substitution() {
        use std::collections::BTreeMap;
        let mut dims = BTreeMap::new();
        dims.insert("os".to_string(), vec!["linux".to_string()]);
        let spec = MatrixSpec {
            dimensions: dims,
            exclude: vec![],
        };
        let bindings = expand_matrix(Some(&spec)).unwrap();
        assert_eq!(bindings.len(), 1);
        // No placeholders in this step's text, so substitution is the
        // identity regardless of a non-empty binding.
        let s = step("build", &[]);
        let substituted = substitute_step(&s, &bindings[0]);
        assert_eq!(substituted.name, s.name);
    }

    #[test]
    fn no_matrix_yields_single_empty_binding() {
        let bindings = expand_matrix(None).unwrap();
        assert_eq!(bindings, vec![Binding::new()]);
    }
}

//! Cycle detection and layered topological ordering over a pipeline's step
//! dependency graph (section 4.1).
//!
//! Grounded on `buildit-scheduler::orchestrator::{topological_sort,
//! topo_visit}`, generalized from a single DFS-emitted linear order to
//! repeated ready-set ("layer") emission so independent steps can be
//! scheduled concurrently (fan-out/fan-in, scenario 2 of section 8).

use std::collections::{HashMap, HashSet};

use c8s_core::Error;

/// One node in the dependency graph: just enough to build edges and detect
/// cycles. The DAG builder operates on step *names*; callers map names back
/// to full `Step` values.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub depends_on: Vec<String>,
}

/// A layer is an unordered set of step names whose dependencies are all
/// satisfied by earlier layers. Layers are emitted in schedule order; within
/// a layer, order is unspecified (section 4.1).
pub type Layer = Vec<String>;

/// Validate the graph shape (duplicate names, missing references,
/// self-references) and return the layered topological order.
///
/// Errors name the offending step or pair, per the testable property in
/// section 8 ("For every rejected pipeline, the rejection reason identifies
/// a specific offending step or pair").
pub fn build_layers(nodes: &[Node]) -> Result<Vec<Layer>, Error> {
    if nodes.is_empty() {
        return Err(Error::validation("pipeline must declare at least one step"));
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(Error::validation(format!(
                "duplicate step name '{}'",
                node.name
            )));
        }
    }

    let index: HashMap<&str, &Node> = nodes.iter().map(|n| (n.name.as_str(), n)).collect();

    for node in nodes {
        for dep in &node.depends_on {
            if dep == &node.name {
                return Err(Error::validation(format!(
                    "step '{}' depends on itself",
                    node.name
                )));
            }
            if !index.contains_key(dep.as_str()) {
                return Err(Error::validation(format!(
                    "step '{}' depends on undefined step '{}'",
                    node.name, dep
                )));
            }
        }
    }

    detect_cycle(nodes, &index)?;

    // Kahn's algorithm: repeatedly emit the set of remaining nodes whose
    // incoming edges are all fulfilled.
    let mut remaining: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|name| {
                let node = index[name];
                node.depends_on.iter().all(|d| done.contains(d.as_str()))
            })
            .collect();

        if ready.is_empty() {
            // Defense in depth: detect_cycle above should have already
            // caught this, but a malformed graph that slips past it must
            // not spin forever.
            let stuck: Vec<String> = remaining.iter().map(|s| s.to_string()).collect();
            return Err(Error::validation(format!(
                "cycle detected among steps: {}",
                stuck.join(", ")
            )));
        }

        let mut layer: Layer = ready.iter().map(|s| s.to_string()).collect();
        layer.sort();
        for name in &ready {
            remaining.remove(name);
            done.insert(name);
        }
        layers.push(layer);
    }

    Ok(layers)
}

/// DFS with an explicit recursion stack; on finding a back-edge, walks the
/// stack to report the exact cycle path, e.g. `x -> y -> x`.
fn detect_cycle(nodes: &[Node], index: &HashMap<&str, &Node>) -> Result<(), Error> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        name: &'a str,
        index: &HashMap<&'a str, &'a Node>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), Error> {
        if let Some(mark) = marks.get(name) {
            if *mark == Mark::InProgress {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<&str> = stack[start..].to_vec();
                path.push(name);
                return Err(Error::validation(format!(
                    "dependency cycle detected: {}",
                    path.join(" -> ")
                )));
            }
            return Ok(());
        }

        marks.insert(name, Mark::InProgress);
        stack.push(name);

        if let Some(node) = index.get(name) {
            for dep in &node.depends_on {
                visit(dep, index, marks, stack)?;
            }
        }

        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for node in nodes {
        visit(&node.name, index, &mut marks, &mut stack)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, deps: &[&str]) -> Node {
        Node {
            name: name.to_string(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn rejects_empty_pipeline() {
        assert!(build_layers(&[]).is_err());
    }

    #[test]
    fn single_step_is_one_layer() {
        let layers = build_layers(&[node("build", &[])]).unwrap();
        assert_eq!(layers, vec![vec!["build".to_string()]]);
    }

    #[test]
    fn linear_pipeline_is_three_layers() {
        let nodes = vec![
            node("build", &[]),
            node("test", &["build"]),
            node("package", &["test"]),
        ];
        let layers = build_layers(&nodes).unwrap();
        assert_eq!(
            layers,
            vec![
                vec!["build".to_string()],
                vec!["test".to_string()],
                vec!["package".to_string()],
            ]
        );
    }

    #[test]
    fn fan_out_fan_in() {
        let nodes = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ];
        let layers = build_layers(&nodes).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["a".to_string()]);
        assert_eq!(layers[1], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(layers[2], vec!["d".to_string()]);
    }

    #[test]
    fn every_step_appears_exactly_once_in_a_later_layer_than_its_deps() {
        let nodes = vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ];
        let layers = build_layers(&nodes).unwrap();
        let layer_of = |name: &str| layers.iter().position(|l| l.contains(&name.to_string())).unwrap();
        assert!(layer_of("b") > layer_of("a"));
        assert!(layer_of("c") > layer_of("a"));
        assert!(layer_of("d") > layer_of("b"));
        assert!(layer_of("d") > layer_of("c"));
        let total: usize = layers.iter().map(|l| l.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn rejects_cycle_naming_the_path() {
        let nodes = vec![node("x", &["y"]), node("y", &["x"])];
        let err = build_layers(&nodes).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("x"));
        assert!(msg.contains("y"));
    }

    #[test]
    fn rejects_self_dependency() {
        let nodes = vec![node("a", &["a"])];
        assert!(build_layers(&nodes).is_err());
    }

    #[test]
    fn rejects_missing_reference() {
        let nodes = vec![node("a", &["ghost"])];
        assert!(build_layers(&nodes).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let nodes = vec![node("a", &[]), node("a", &[])];
        assert!(build_layers(&nodes).is_err());
    }
}

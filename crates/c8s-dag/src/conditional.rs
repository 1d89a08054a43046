//! `conditional.branch` pre-expansion step filtering (see DESIGN.md for the
//! rationale): a step whose
//! `conditional.branch` regex does not match the run's branch is excluded
//! from the DAG entirely, and any step that (transitively) `dependsOn` an
//! excluded step is excluded too. Rejected if this would exclude every
//! step.

use std::collections::HashSet;

use c8s_core::Error;
use regex::Regex;

/// Minimal view a caller needs to supply for filtering: name, dependsOn,
/// and the optional branch regex.
pub struct FilterInput<'a> {
    pub name: &'a str,
    pub depends_on: &'a [String],
    pub branch_pattern: Option<&'a str>,
}

/// Returns the set of step names excluded by branch filtering (direct or
/// transitive).
pub fn excluded_steps(steps: &[FilterInput<'_>], branch: &str) -> Result<HashSet<String>, Error> {
    let mut excluded: HashSet<String> = HashSet::new();

    for step in steps {
        if let Some(pattern) = step.branch_pattern {
            let re = Regex::new(pattern)
                .map_err(|e| Error::validation(format!("invalid conditional.branch regex '{pattern}': {e}")))?;
            if !re.is_match(branch) {
                excluded.insert(step.name.to_string());
            }
        }
    }

    // Transitive closure: a step depending (directly or indirectly) on an
    // excluded step is excluded too.
    loop {
        let mut added = false;
        for step in steps {
            if excluded.contains(step.name) {
                continue;
            }
            if step.depends_on.iter().any(|d| excluded.contains(d)) {
                excluded.insert(step.name.to_string());
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    if excluded.len() == steps.len() {
        return Err(Error::validation(
            "conditional.branch filtering excludes every step for this branch",
        ));
    }

    Ok(excluded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_conditionals_excludes_nothing() {
        let steps = vec![FilterInput {
            name: "build",
            depends_on: &[],
            branch_pattern: None,
        }];
        let excluded = excluded_steps(&steps, "main").unwrap();
        assert!(excluded.is_empty());
    }

    #[test]
    fn excludes_non_matching_branch_step() {
        let deploy_deps: Vec<String> = vec![];
        let steps = vec![FilterInput {
            name: "deploy",
            depends_on: &deploy_deps,
            branch_pattern: Some("^main$"),
        }];
        let excluded = excluded_steps(&steps, "feature/x").unwrap();
        assert!(excluded.contains("deploy"));
    }

    #[test]
    fn excludes_transitively() {
        let no_deps: Vec<String> = vec![];
        let deploy_deps: Vec<String> = vec!["build".to_string()];
        let publish_deps: Vec<String> = vec!["deploy".to_string()];
        let steps = vec![
            FilterInput {
                name: "lint",
                depends_on: &no_deps,
                branch_pattern: None,
            },
            FilterInput {
                name: "build",
                depends_on: &no_deps,
                branch_pattern: Some("^main$"),
            },
            FilterInput {
                name: "deploy",
                depends_on: &deploy_deps,
                branch_pattern: None,
            },
            FilterInput {
                name: "publish",
                depends_on: &publish_deps,
                branch_pattern: None,
            },
        ];
        let excluded = excluded_steps(&steps, "feature/x").unwrap();
        assert_eq!(excluded.len(), 3);
        assert!(!excluded.contains("lint"));
    }

    #[test]
    fn rejects_excluding_every_step() {
        let no_deps: Vec<String> = vec![];
        let steps = vec![FilterInput {
            name: "only",
            depends_on: &no_deps,
            branch_pattern: Some("^main$"),
        }];
        assert!(excluded_steps(&steps, "feature/x").is_err());
    }
}

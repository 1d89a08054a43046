//! Matrix expansion: cartesian product of named dimensions with exclusion
//! filtering (section 4.1).

use std::collections::BTreeMap;

use c8s_core::Error;

pub type Binding = BTreeMap<String, String>;

/// Expand `dimensions` into the cartesian product of bindings, in
/// deterministic order (dimensions sorted by name, already guaranteed by
/// `BTreeMap`'s iteration order; values in declared order), then drop any
/// binding matching every key/value pair of an exclusion entry. Fails if
/// every binding is excluded, or if a declared dimension has no values, or
/// if an exclusion key does not name a declared dimension.
pub fn expand(dimensions: &BTreeMap<String, Vec<String>>, exclude: &[Binding]) -> Result<Vec<Binding>, Error> {
    if dimensions.is_empty() {
        return Err(Error::validation("matrix must declare at least one dimension"));
    }
    for (name, values) in dimensions {
        if values.is_empty() {
            return Err(Error::validation(format!(
                "matrix dimension '{name}' has no values"
            )));
        }
    }
    for excl in exclude {
        for key in excl.keys() {
            if !dimensions.contains_key(key) {
                return Err(Error::validation(format!(
                    "matrix exclusion references undeclared dimension '{key}'"
                )));
            }
        }
    }

    let mut bindings: Vec<Binding> = vec![Binding::new()];
    // BTreeMap iterates keys in sorted order already, giving the dimensions
    // a deterministic order.
    for (name, values) in dimensions {
        let mut next = Vec::with_capacity(bindings.len() * values.len());
        for existing in &bindings {
            for value in values {
                let mut b = existing.clone();
                b.insert(name.clone(), value.clone());
                next.push(b);
            }
        }
        bindings = next;
    }

    let kept: Vec<Binding> = bindings
        .into_iter()
        .filter(|binding| !matches_any_exclusion(binding, exclude))
        .collect();

    if kept.is_empty() {
        return Err(Error::validation(
            "matrix exclusions remove every combination",
        ));
    }

    Ok(kept)
}

fn matches_any_exclusion(binding: &Binding, exclude: &[Binding]) -> bool {
    exclude
        .iter()
        .any(|excl| excl.iter().all(|(k, v)| binding.get(k) == Some(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| {
                (
                    k.to_string(),
                    vs.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn binding(pairs: &[(&str, &str)]) -> Binding {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn single_dimension_single_value() {
        let d = dims(&[("os", &["linux"])]);
        let out = expand(&d, &[]).unwrap();
        assert_eq!(out, vec![binding(&[("os", "linux")])]);
    }

    #[test]
    fn cartesian_product_with_exclusion_matches_scenario_4() {
        let d = dims(&[("os", &["linux", "darwin"]), ("go", &["1.21", "1.22"])]);
        let exclude = vec![binding(&[("os", "darwin"), ("go", "1.21")])];
        let out = expand(&d, &exclude).unwrap();
        assert_eq!(
            out,
            vec![
                binding(&[("go", "1.21"), ("os", "linux")]),
                binding(&[("go", "1.22"), ("os", "linux")]),
                binding(&[("go", "1.22"), ("os", "darwin")]),
            ]
        );
    }

    #[test]
    fn counts_match_product_minus_excluded() {
        let d = dims(&[("a", &["1", "2", "3"]), ("b", &["x", "y"])]);
        let exclude = vec![binding(&[("a", "2")])];
        let out = expand(&d, &exclude).unwrap();
        // 3*2 - 2 (both b values for a=2) = 4
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn exclusion_covering_everything_is_rejected() {
        let d = dims(&[("os", &["linux"])]);
        let exclude = vec![binding(&[("os", "linux")])];
        assert!(expand(&d, &exclude).is_err());
    }

    #[test]
    fn rejects_empty_dimension_values() {
        let d = dims(&[("os", &[])]);
        assert!(expand(&d, &[]).is_err());
    }

    #[test]
    fn rejects_exclusion_on_unknown_dimension() {
        let d = dims(&[("os", &["linux"])]);
        let exclude = vec![binding(&[("arch", "amd64")])];
        assert!(expand(&d, &exclude).is_err());
    }

    #[test]
    fn rejects_no_dimensions() {
        let d: BTreeMap<String, Vec<String>> = BTreeMap::new();
        assert!(expand(&d, &[]).is_err());
    }
}

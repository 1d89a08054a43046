//! Deterministic workload naming (section 4.4 step 6): `{run-name}-{step-name}`,
//! truncated to the store's DNS-1123 length (63) and suffixed with a stable
//! short hash when truncation would otherwise produce a collision between
//! two different untruncated names.

use sha2::{Digest, Sha256};

const DNS1123_MAX_LEN: usize = 63;
const HASH_SUFFIX_LEN: usize = 8;

/// Compute the workload name for a step of a run. Pure and deterministic:
/// the same `(run_name, step_name)` pair always yields the same name, and
/// two different pairs that would truncate to the same prefix get distinct
/// hash suffixes derived from their full untruncated name.
pub fn workload_name(run_name: &str, step_name: &str) -> String {
    let full = format!("{run_name}-{step_name}");
    if full.len() <= DNS1123_MAX_LEN {
        return full;
    }

    let hash = hex::encode(Sha256::digest(full.as_bytes()));
    let suffix = &hash[..HASH_SUFFIX_LEN];
    let keep = DNS1123_MAX_LEN - HASH_SUFFIX_LEN - 1;
    let mut truncated: String = full.chars().take(keep).collect();
    // Never leave a trailing '-' immediately before the hash suffix; DNS-1123
    // labels must not end a segment with a separator.
    while truncated.ends_with('-') {
        truncated.pop();
    }
    format!("{truncated}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through_unchanged() {
        assert_eq!(workload_name("my-run", "build"), "my-run-build");
    }

    #[test]
    fn long_names_are_truncated_with_a_stable_hash_suffix() {
        let run = "a".repeat(80);
        let name = workload_name(&run, "build");
        assert!(name.len() <= DNS1123_MAX_LEN);
        // deterministic
        assert_eq!(name, workload_name(&run, "build"));
    }

    #[test]
    fn different_long_inputs_get_different_suffixes() {
        let run_a = format!("{}a", "x".repeat(70));
        let run_b = format!("{}b", "x".repeat(70));
        let a = workload_name(&run_a, "build");
        let b = workload_name(&run_b, "build");
        assert_ne!(a, b);
    }
}

//! Matrix variable substitution (section 4.1): replace `${{matrix.K}}` and
//! `${matrix.K}` with the binding value, literally and case-sensitively.
//!
//! Grounded on `buildit-config::variables::VariableContext`'s
//! regex-replace-all interpolation engine, narrowed to the single
//! `matrix.*` namespace the DAG builder needs (the run/git/stage/secret
//! namespaces belong to the workload mapper, not here, since substitution
//! at this layer must stay a total pure function with no run context).

use std::sync::LazyLock;

use regex::Regex;

use crate::matrix::Binding;

// Matches `${{matrix.key}}` first (longer form), falling back to
// `${matrix.key}`. Both forms accept the same key grammar as the rest of
// the corpus's variable interpolation: leading letter/underscore, then
// alphanumerics/underscores.
static DOUBLE_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*matrix\.([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap());
static SINGLE_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{matrix\.([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Replace every `${{matrix.K}}`/`${matrix.K}` occurrence in `text` with the
/// corresponding value from `binding`. A key with no binding entry is left
/// untouched (unknown variables are preserved, not blanked), matching the
/// corpus's interpolation convention of never silently dropping unresolved
/// references.
pub fn interpolate(text: &str, binding: &Binding) -> String {
    let once = DOUBLE_BRACE.replace_all(text, |caps: &regex::Captures| {
        let key = &caps[1];
        binding
            .get(key)
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });
    SINGLE_BRACE
        .replace_all(&once, |caps: &regex::Captures| {
            let key = &caps[1];
            binding
                .get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn interpolate_vec(items: &[String], binding: &Binding) -> Vec<String> {
    items.iter().map(|item| interpolate(item, binding)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, &str)]) -> Binding {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn identity_when_no_placeholders() {
        let b = binding(&[("os", "linux")]);
        assert_eq!(interpolate("plain text", &b), "plain text");
    }

    #[test]
    fn substitutes_double_brace() {
        let b = binding(&[("os", "linux")]);
        assert_eq!(interpolate("image-${{matrix.os}}", &b), "image-linux");
    }

    #[test]
    fn substitutes_single_brace() {
        let b = binding(&[("os", "linux")]);
        assert_eq!(interpolate("image-${matrix.os}", &b), "image-linux");
    }

    #[test]
    fn is_case_sensitive_and_literal() {
        let b = binding(&[("OS", "linux")]);
        // key case mismatch: "os" != "OS", left untouched
        assert_eq!(interpolate("${matrix.os}", &b), "${matrix.os}");
    }

    #[test]
    fn unknown_key_preserved() {
        let b = binding(&[("os", "linux")]);
        assert_eq!(interpolate("${matrix.arch}", &b), "${matrix.arch}");
    }

    #[test]
    fn substitutes_in_vec() {
        let b = binding(&[("go", "1.22")]);
        let out = interpolate_vec(&["go build".to_string(), "go-${matrix.go}".to_string()], &b);
        assert_eq!(out, vec!["go build".to_string(), "go-1.22".to_string()]);
    }
}

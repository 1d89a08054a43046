//! Secret masking (section 4.7 "Masking"): every referenced secret value is
//! replaced by a fixed marker before bytes reach the ring buffer or the
//! object store, using length-descending search so a short secret that
//! happens to be a prefix of a longer one doesn't partially unmask it.

pub const REDACTED: &str = "***REDACTED***";

#[derive(Debug, Clone, Default)]
pub struct SecretMasker {
    /// Sorted longest-first so substrings of a longer secret never get
    /// matched (and redacted) ahead of the full value.
    needles: Vec<String>,
}

impl SecretMasker {
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        let mut needles: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        needles.sort_by_key(|v| std::cmp::Reverse(v.len()));
        needles.dedup();
        SecretMasker { needles }
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }

    /// Mask occurrences of any registered secret in `chunk`. Operates on a
    /// best-effort UTF-8 decode of the chunk; a secret value split across
    /// two separate `write()` calls is not caught (section 4.7 scopes
    /// masking per write, not per stream).
    pub fn mask(&self, chunk: &[u8]) -> Vec<u8> {
        if self.needles.is_empty() {
            return chunk.to_vec();
        }
        let mut text = String::from_utf8_lossy(chunk).into_owned();
        for needle in &self.needles {
            text = replace_case_insensitive(&text, needle, REDACTED);
        }
        text.into_bytes()
    }
}

fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_lowercase();
    let lower_needle = needle.to_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(offset) = lower_haystack[cursor..].find(&lower_needle) {
        let match_start = cursor + offset;
        let match_end = match_start + needle.len();
        result.push_str(&haystack[cursor..match_start]);
        result.push_str(replacement);
        cursor = match_end;
    }
    result.push_str(&haystack[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_exact_match() {
        let masker = SecretMasker::new(vec!["s3kr3t".to_string()]);
        assert_eq!(masker.mask(b"token=s3kr3t"), format!("token={REDACTED}").as_bytes());
    }

    #[test]
    fn masking_is_case_insensitive() {
        let masker = SecretMasker::new(vec!["TopSecret".to_string()]);
        assert_eq!(
            String::from_utf8(masker.mask(b"value: topsecret done")).unwrap(),
            format!("value: {REDACTED} done")
        );
    }

    #[test]
    fn longer_secret_masked_before_its_prefix() {
        let masker = SecretMasker::new(vec!["abc".to_string(), "abcdef".to_string()]);
        assert_eq!(
            String::from_utf8(masker.mask(b"leak abcdef here")).unwrap(),
            format!("leak {REDACTED} here")
        );
    }

    #[test]
    fn no_secrets_is_passthrough() {
        let masker = SecretMasker::new(Vec::<String>::new());
        assert_eq!(masker.mask(b"hello"), b"hello");
    }
}

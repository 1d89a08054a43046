//! Webhook signature verification (section 4.6 step 5). Grounds the HMAC
//! construction on `buildit_api::routes::webhooks::verify_github_signature`,
//! reused as-is for Bitbucket (identical `sha256=<hex>` scheme) and widened
//! with a plain-token comparison for GitLab's `X-Gitlab-Token` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// GitHub/Bitbucket: HMAC-SHA256 over the raw body, `sha256=<hex>` header.
pub fn verify_hmac_sha256(secret: &str, body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(signature) = signature_header else {
        return false;
    };
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

/// GitLab: plain constant-time(-ish) token equality with `X-Gitlab-Token`.
pub fn verify_token(secret: &str, token_header: Option<&str>) -> bool {
    match token_header {
        Some(token) => {
            // Not attacker-timed over the network in the way an HMAC
            // comparison is, but GitLab's own token scheme is a plain
            // shared secret, not an HMAC, so this mirrors what it sends.
            token.as_bytes().len() == secret.as_bytes().len()
                && token
                    .bytes()
                    .zip(secret.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_roundtrip() {
        let secret = "shh";
        let body = b"payload";
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        assert!(verify_hmac_sha256(secret, body, Some(&sig)));
        assert!(!verify_hmac_sha256(secret, body, Some("sha256=deadbeef")));
        assert!(!verify_hmac_sha256(secret, body, None));
    }

    #[test]
    fn token_equality() {
        assert!(verify_token("mytoken", Some("mytoken")));
        assert!(!verify_token("mytoken", Some("wrong")));
        assert!(!verify_token("mytoken", None));
    }
}

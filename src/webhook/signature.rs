//! HMAC signature verification for GitHub webhook deliveries
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw request body and
//! sends the hex digest in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//!
//! An empty secret disables verification entirely and every delivery is
//! accepted. This mirrors the behaviour operators rely on for local testing;
//! production deployments must configure a secret.

use constant_time_eq::constant_time_eq;
use ring::hmac;
use zeroize::Zeroizing;

const SHA256_PREFIX: &str = "sha256=";
const SHA1_PREFIX: &str = "sha1=";

/// Outcome of a signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No secret configured, verification skipped
    Disabled,
    Valid,
    /// Secret configured but the delivery carried no signature
    Missing,
    Mismatch,
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Disabled | SignatureCheck::Valid)
    }
}

/// Validates webhook payloads against a shared secret
pub struct SignatureVerifier {
    secret: Zeroizing<String>,
    key: Option<hmac::Key>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = Zeroizing::new(secret.into());
        let key = if secret.is_empty() {
            None
        } else {
            Some(hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()))
        };
        Self { secret, key }
    }

    /// Whether signature checking is active
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Verify `signature_header` for `body`
    pub fn verify(&self, body: &[u8], signature_header: &str) -> bool {
        self.check(body, signature_header).is_valid()
    }

    /// Verify and report why a signature was refused
    pub fn check(&self, body: &[u8], signature_header: &str) -> SignatureCheck {
        let key = match &self.key {
            Some(key) => key,
            None => return SignatureCheck::Disabled,
        };

        if signature_header.is_empty() {
            return SignatureCheck::Missing;
        }

        let provided = strip_signature_prefix(signature_header);
        let expected = hex::encode(hmac::sign(key, body).as_ref());

        if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Mismatch
        }
    }

    /// Produce the header value GitHub would send for `body`
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        self.key
            .as_ref()
            .map(|key| format!("{}{}", SHA256_PREFIX, hex::encode(hmac::sign(key, body).as_ref())))
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SignatureVerifier([REDACTED {} bytes])",
            self.secret.len()
        )
    }
}

/// Free-function form of [`SignatureVerifier::verify`]
pub fn verify(body: &[u8], signature_header: &str, secret: &str) -> bool {
    SignatureVerifier::new(secret).verify(body, signature_header)
}

fn strip_signature_prefix(header: &str) -> &str {
    header
        .strip_prefix(SHA256_PREFIX)
        .or_else(|| header.strip_prefix(SHA1_PREFIX))
        .unwrap_or(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-hmac-validation";

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = b"test message";
        let signature = verifier.sign(body).unwrap();

        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), 71); // "sha256=" (7) + 64 hex chars
        assert_eq!(verifier.check(body, &signature), SignatureCheck::Valid);
        assert!(verify(body, &signature, SECRET));
    }

    #[test]
    fn test_known_digest() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let body = b"The quick brown fox jumps over the lazy dog";
        let header = "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8";
        assert!(verify(body, header, "key"));
    }

    #[test]
    fn test_mutated_body_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = br#"{"action":"published"}"#.to_vec();
        let signature = verifier.sign(&body).unwrap();

        for i in 0..body.len() {
            let mut mutated = body.clone();
            mutated[i] ^= 0x01;
            assert_eq!(
                verifier.check(&mutated, &signature),
                SignatureCheck::Mismatch,
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_mismatch_at_any_digit_takes_the_same_path() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = b"position";
        let signature = verifier.sign(body).unwrap();
        let digits = signature.strip_prefix("sha256=").unwrap();

        // First digit, last digit, and everything between compare through
        // constant_time_eq and fail identically
        for i in 0..digits.len() {
            let mut forged: Vec<u8> = digits.bytes().collect();
            forged[i] = if forged[i] == b'0' { b'1' } else { b'0' };
            let forged = format!("sha256={}", String::from_utf8(forged).unwrap());

            assert_eq!(
                verifier.check(body, &forged),
                SignatureCheck::Mismatch,
                "digit {} was accepted",
                i
            );
        }

        let truncated = &signature[..signature.len() - 1];
        assert_eq!(verifier.check(body, truncated), SignatureCheck::Mismatch);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = b"payload";
        let signature = SignatureVerifier::new("other-secret").sign(body).unwrap();
        assert!(!verify(body, &signature, SECRET));
    }

    #[test]
    fn test_missing_signature() {
        let verifier = SignatureVerifier::new(SECRET);
        assert_eq!(verifier.check(b"payload", ""), SignatureCheck::Missing);
        assert!(!verifier.verify(b"payload", ""));
    }

    #[test]
    fn test_empty_secret_disables_verification() {
        let verifier = SignatureVerifier::new("");
        assert!(!verifier.is_enabled());
        assert_eq!(verifier.check(b"payload", ""), SignatureCheck::Disabled);
        assert!(verifier.verify(b"payload", "sha256=garbage"));
        assert!(verify(b"anything", "", ""));
        assert!(verifier.sign(b"payload").is_none());
    }

    #[test]
    fn test_sha1_prefix_is_stripped() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = b"legacy";
        let digest = verifier.sign(body).unwrap();
        let hex = digest.strip_prefix("sha256=").unwrap();

        assert!(verifier.verify(body, &format!("sha1={}", hex)));
    }

    #[test]
    fn test_unprefixed_header_compares_raw_value() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = b"raw";
        let digest = verifier.sign(body).unwrap();
        let hex = digest.strip_prefix("sha256=").unwrap();

        assert!(verifier.verify(body, hex));
        assert!(!verifier.verify(body, "abcdef1234567890"));
    }

    #[test]
    fn test_uppercase_hex_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let body = b"case";
        let signature = verifier.sign(body).unwrap().to_uppercase().replace("SHA256=", "sha256=");
        assert!(!verifier.verify(body, &signature));
    }

    #[test]
    fn test_different_bodies_different_signatures() {
        let verifier = SignatureVerifier::new(SECRET);
        let signature1 = verifier.sign(b"message one").unwrap();
        let signature2 = verifier.sign(b"message two").unwrap();

        assert_ne!(signature1, signature2);
        assert!(!verifier.verify(b"message one", &signature2));
        assert!(!verifier.verify(b"message two", &signature1));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let verifier = SignatureVerifier::new(SECRET);
        let rendered = format!("{:?}", verifier);
        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("REDACTED"));
    }
}

//! Signed session cookies.
//!
//! The session token is sent to the browser as `<token>.<signature>`, where
//! the signature is an Ed25519 signature over the token made with a key
//! derived from the process-wide session secret. A cookie whose signature
//! does not verify is ignored, so a client cannot pick another session's
//! token.
//!
//! # Example
//!
//! ```rust
//! use todolists_server::cookie::CookieSigner;
//!
//! let signer = CookieSigner::new(&[7u8; 32]);
//! let value = signer.sign("some-token");
//!
//! assert_eq!(signer.verify(&value).as_deref(), Some("some-token"));
//! assert!(signer.verify("some-token.forged").is_none());
//! ```

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, SIGNATURE_LENGTH};
use tracing::trace;

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE_NAME: &str = "todolists_session";

/// Length in bytes of the session secret.
pub const SECRET_LENGTH: usize = 32;

/// Signs and verifies session cookie values.
#[derive(Clone)]
pub struct CookieSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl CookieSigner {
    /// Creates a signer whose key is derived from `secret`.
    pub fn new(secret: &[u8; SECRET_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Returns the cookie value for `token`.
    pub fn sign(&self, token: &str) -> String {
        let signature = self.signing_key.sign(token.as_bytes());
        format!("{token}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    /// Returns the token carried by `value` if its signature is valid.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (token, signature_b64) = value.rsplit_once('.')?;

        let signature_bytes = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
        let signature_array: [u8; SIGNATURE_LENGTH] = signature_bytes.try_into().ok()?;
        let signature = Signature::from_bytes(&signature_array);

        match self.verifying_key.verify_strict(token.as_bytes(), &signature) {
            Ok(()) => Some(token.to_string()),
            Err(_) => {
                trace!("Session cookie signature rejected");
                None
            }
        }
    }

    /// Extracts and verifies the session token from the request's `Cookie`
    /// headers.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE_NAME)
            .find_map(|(_, value)| self.verify(value))
    }

    /// Builds a `Set-Cookie` header value for `token`.
    pub fn set_cookie_header(&self, token: &str, max_age_secs: u64, secure: bool) -> String {
        let mut header = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}",
            self.sign(token)
        );
        if secure {
            header.push_str("; Secure");
        }
        header
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner")
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signer(seed: u8) -> CookieSigner {
        CookieSigner::new(&[seed; SECRET_LENGTH])
    }

    #[test]
    fn signed_value_verifies() {
        let signer = signer(1);
        let value = signer.sign("abc");

        assert!(value.starts_with("abc."));
        assert_eq!(signer.verify(&value).as_deref(), Some("abc"));
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = signer(1);
        assert_eq!(signer.sign("abc"), signer.sign("abc"));
    }

    #[test]
    fn value_from_other_secret_is_rejected() {
        let value = signer(1).sign("abc");
        assert!(signer(2).verify(&value).is_none());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = signer(1);
        let value = signer.sign("abc");
        let forged = value.replacen("abc", "abd", 1);

        assert!(signer.verify(&forged).is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let signer = signer(1);

        assert!(signer.verify("no-signature").is_none());
        assert!(signer.verify("abc.!!!").is_none());
        assert!(signer.verify("abc.c2hvcnQ").is_none());
        assert!(signer.verify("").is_none());
    }

    #[test]
    fn token_from_headers_finds_session_cookie() {
        let signer = signer(3);
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; {SESSION_COOKIE_NAME}={}; other=1", signer.sign("tok"));
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());

        assert_eq!(signer.token_from_headers(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn token_from_headers_ignores_missing_or_forged_cookie() {
        let signer = signer(3);
        let mut headers = HeaderMap::new();
        assert!(signer.token_from_headers(&headers).is_none());

        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}=tok.forged")).unwrap(),
        );
        assert!(signer.token_from_headers(&headers).is_none());
    }

    #[test]
    fn set_cookie_header_has_expected_attributes() {
        let signer = signer(4);

        let header = signer.set_cookie_header("tok", 60, false);
        assert!(header.starts_with(&format!("{SESSION_COOKIE_NAME}=tok.")));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Max-Age=60"));
        assert!(!header.contains("Secure"));

        assert!(signer.set_cookie_header("tok", 60, true).ends_with("; Secure"));
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", signer(5));
        assert!(debug.contains("<redacted>"));
    }
}

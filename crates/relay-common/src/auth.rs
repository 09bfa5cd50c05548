//! Authentication primitives for the relay.
//!
//! - **Bearer parsing**: pull the credential out of an `Authorization` header
//! - **Token validation**: compare it against the single shared secret

use std::fmt;

use subtle::ConstantTimeEq;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

/// Refusal to build a [`TokenValidator`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("shared secret is not configured")]
    Missing,
}

/// Outcome of checking a presented credential.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed bearer credential")]
    Unauthenticated,
    #[error("credential does not match the shared secret")]
    Forbidden,
}

// ── Bearer header ───────────────────────────────────────────────────

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-sensitively. Only the first space-delimited
/// segment after the scheme is taken, so `Bearer abc extra` yields `abc`.
/// An empty token is treated as malformed.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let rest = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthenticated)?;
    match rest.split(' ').next() {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Unauthenticated),
    }
}

// ── Shared secret ───────────────────────────────────────────────────

/// Validates presented credentials against one process-wide secret.
///
/// Immutable after construction, so it can be shared freely between tasks.
#[derive(Clone)]
pub struct TokenValidator {
    secret: Box<[u8]>,
}

impl TokenValidator {
    /// Build a validator. An empty secret is refused rather than accepted as
    /// "anything goes".
    pub fn new(secret: impl Into<String>) -> Result<Self, SecretError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SecretError::Missing);
        }
        Ok(Self {
            secret: secret.into_bytes().into_boxed_slice(),
        })
    }

    /// True iff `presented` is byte-equal to the configured secret.
    pub fn validate(&self, presented: &str) -> bool {
        presented.as_bytes().ct_eq(&*self.secret).into()
    }

    /// Full header check: parse the bearer scheme, then validate the token.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), AuthError> {
        let token = parse_bearer(header.ok_or(AuthError::Unauthenticated)?)?;
        if self.validate(token) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_rejected() {
        assert_eq!(
            TokenValidator::new("").unwrap_err(),
            SecretError::Missing
        );
    }

    #[test]
    fn matching_token_accepted() {
        let v = TokenValidator::new("abc123").unwrap();
        assert!(v.validate("abc123"));
    }

    #[test]
    fn comparison_is_exact() {
        let v = TokenValidator::new("abc123").unwrap();
        assert!(!v.validate("ABC123"));
        assert!(!v.validate("abc12"));
        assert!(!v.validate("abc1234"));
        assert!(!v.validate(""));
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc123"), Ok("abc123"));
        assert_eq!(parse_bearer("Bearer abc123 trailing"), Ok("abc123"));
        assert_eq!(parse_bearer("Bearer "), Err(AuthError::Unauthenticated));
        assert_eq!(parse_bearer("bearer abc123"), Err(AuthError::Unauthenticated));
        assert_eq!(parse_bearer("Basic abc123"), Err(AuthError::Unauthenticated));
        assert_eq!(parse_bearer("abc123"), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn authorize_distinguishes_missing_from_wrong() {
        let v = TokenValidator::new("abc123").unwrap();
        assert_eq!(v.authorize(Some("Bearer abc123")), Ok(()));
        assert_eq!(v.authorize(Some("Bearer wrong")), Err(AuthError::Forbidden));
        assert_eq!(v.authorize(Some("Token abc123")), Err(AuthError::Unauthenticated));
        assert_eq!(v.authorize(None), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let v = TokenValidator::new("hunter2").unwrap();
        assert!(!format!("{v:?}").contains("hunter2"));
    }
}

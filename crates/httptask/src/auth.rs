//! Authentication header strategies

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::FetchError;
use crate::types::AuthMode;

/// Header carrying credentials
pub const AUTHORIZATION: &str = "Authorization";

/// Scheme token for basic auth. Upper case on purpose: existing servers and
/// callers of this tool expect exactly these six bytes.
pub const BASIC_SCHEME: &str = "BASIC ";

/// Header producer chosen from an [`AuthMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    None,
    Basic,
}

impl AuthStrategy {
    /// Resolve the strategy for a mode; digest has no implementation
    pub fn for_mode(mode: AuthMode) -> Result<Self, FetchError> {
        match mode {
            AuthMode::None => Ok(AuthStrategy::None),
            AuthMode::Basic => Ok(AuthStrategy::Basic),
            AuthMode::Digest => Err(FetchError::UnsupportedAuth(mode)),
        }
    }

    /// Produce the header to attach, if any
    pub fn header(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Option<(&'static str, String)> {
        match self {
            AuthStrategy::None => None,
            AuthStrategy::Basic => {
                let username = username.filter(|u| !u.is_empty())?;
                let credentials = format!("{}:{}", username, password.unwrap_or(""));
                let encoded = STANDARD.encode(credentials.as_bytes());
                Some((AUTHORIZATION, format!("{BASIC_SCHEME}{encoded}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(value: &str) -> String {
        let encoded = value.strip_prefix(BASIC_SCHEME).unwrap();
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_basic_header_round_trip() {
        let (name, value) = AuthStrategy::Basic.header(Some("u"), Some("p")).unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "BASIC dTpw");
        assert_eq!(decode(&value), "u:p");
    }

    #[test]
    fn test_basic_header_is_deterministic() {
        let a = AuthStrategy::Basic.header(Some("alice"), Some("s3cret:x"));
        let b = AuthStrategy::Basic.header(Some("alice"), Some("s3cret:x"));
        assert_eq!(a, b);
        assert_eq!(decode(&a.unwrap().1), "alice:s3cret:x");
    }

    #[test]
    fn test_basic_missing_password_is_empty() {
        let (_, value) = AuthStrategy::Basic.header(Some("alice"), None).unwrap();
        assert_eq!(decode(&value), "alice:");
    }

    #[test]
    fn test_basic_without_username_produces_nothing() {
        assert!(AuthStrategy::Basic.header(Some(""), Some("p")).is_none());
        assert!(AuthStrategy::Basic.header(None, Some("p")).is_none());
    }

    #[test]
    fn test_scheme_token_case() {
        let (_, value) = AuthStrategy::Basic.header(Some("u"), Some("p")).unwrap();
        assert!(value.starts_with("BASIC "));
        assert!(!value.starts_with("Basic "));
    }

    #[test]
    fn test_none_produces_nothing() {
        assert!(AuthStrategy::None.header(Some("u"), Some("p")).is_none());
    }

    #[test]
    fn test_digest_is_rejected() {
        let err = AuthStrategy::for_mode(AuthMode::Digest).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedAuth(AuthMode::Digest)));
        assert!(err.is_configuration());
        assert_eq!(
            AuthStrategy::for_mode(AuthMode::Basic).unwrap(),
            AuthStrategy::Basic
        );
    }
}

//! Request parameters and URL assembly
//!
//! Parameters are form-encoded (`application/x-www-form-urlencoded` rules:
//! reserved characters percent-encoded, space as `+`) both when they are
//! appended to the URL and when they become a POST body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::{form_urlencoded, Url};

use crate::error::FetchError;

/// A name/value pair used for query parameters and request headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `name=value` string; the value may be empty
    pub fn parse(s: &str) -> Option<Self> {
        let (name, value) = s.split_once('=')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value))
    }
}

/// Encoded `name=value` form
impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", encode(&self.name), encode(&self.value))
    }
}

/// Form-encode a single component
pub fn encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Join encoded pairs with `&`, preserving order
pub fn encode_pairs(params: &[Param]) -> String {
    params
        .iter()
        .map(Param::to_string)
        .collect::<Vec<_>>()
        .join("&")
}

/// Append parameters to a base URL
///
/// A base that already carries a query string gets `&`, otherwise `?`.
/// Returns the base unchanged when there is nothing to append or when
/// parameters travel in the body instead.
pub fn parameterize(base: &str, params: &[Param], params_in_url: bool) -> String {
    if !params_in_url || params.is_empty() {
        return base.to_string();
    }

    let mut url = String::with_capacity(base.len() + params.len() * 16);
    url.push_str(base);
    url.push(if base.contains('?') { '&' } else { '?' });
    url.push_str(&encode_pairs(params));
    url
}

/// Build the final request URL
pub fn build_url(base: &str, params: &[Param], params_in_url: bool) -> Result<Url, FetchError> {
    let raw = parameterize(base, params, params_in_url);
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw} ({e})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reserved_characters() {
        assert_eq!(encode("a b"), "a+b");
        assert_eq!(encode("a&b=c"), "a%26b%3Dc");
        assert_eq!(encode("x?y/z"), "x%3Fy%2Fz");
        assert_eq!(encode("safe-._*"), "safe-._*");
        assert_eq!(encode("ü"), "%C3%BC");
    }

    #[test]
    fn test_param_display_encodes_both_sides() {
        let p = Param::new("first name", "Jo&Jo");
        assert_eq!(p.to_string(), "first+name=Jo%26Jo");
    }

    #[test]
    fn test_param_parse() {
        assert_eq!(Param::parse("a=1"), Some(Param::new("a", "1")));
        assert_eq!(Param::parse("a="), Some(Param::new("a", "")));
        assert_eq!(Param::parse("a=b=c"), Some(Param::new("a", "b=c")));
        assert_eq!(Param::parse("novalue"), None);
        assert_eq!(Param::parse("=x"), None);
    }

    #[test]
    fn test_parameterize_no_params() {
        assert_eq!(
            parameterize("http://example.com/a", &[], true),
            "http://example.com/a"
        );
    }

    #[test]
    fn test_parameterize_params_not_in_url() {
        let params = vec![Param::new("a", "1")];
        assert_eq!(
            parameterize("http://example.com/a", &params, false),
            "http://example.com/a"
        );
    }

    #[test]
    fn test_parameterize_order_and_separators() {
        let params = vec![
            Param::new("z", "last?"),
            Param::new("a", "x y"),
            Param::new("m", ""),
        ];
        let url = parameterize("http://example.com/search", &params, true);
        assert_eq!(url, "http://example.com/search?z=last%3F&a=x+y&m=");
        assert_eq!(url.matches('?').count(), 1);
        assert_eq!(url.matches('&').count(), 2);
    }

    #[test]
    fn test_parameterize_existing_query() {
        let params = vec![Param::new("page", "2")];
        let url = parameterize("http://example.com/list?sort=asc", &params, true);
        assert_eq!(url, "http://example.com/list?sort=asc&page=2");
        assert_eq!(url.matches('?').count(), 1);
    }

    #[test]
    fn test_build_url_valid() {
        let url = build_url("http://example.com/p", &[Param::new("q", "rust lang")], true).unwrap();
        assert_eq!(url.as_str(), "http://example.com/p?q=rust+lang");
        assert_eq!(url.query(), Some("q=rust+lang"));
    }

    #[test]
    fn test_build_url_invalid() {
        let err = build_url("not a url", &[], true).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_encode_pairs_for_body() {
        let params = vec![Param::new("a", "1"), Param::new("b", "two words")];
        assert_eq!(encode_pairs(&params), "a=1&b=two+words");
    }
}

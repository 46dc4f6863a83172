//! Core types for HttpTask

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::params::Param;
use crate::DEFAULT_BLOCK_SIZE_KB;

/// HTTP method for the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Methods that carry a request body
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// Methods whose response never carries a body
    pub fn has_response_body(&self) -> bool {
        *self != HttpMethod::Head
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("Invalid method: {s}")),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme selected for the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Basic,
    /// Recognized but not implemented; rejected at verify time
    Digest,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(AuthMode::None),
            "basic" => Ok(AuthMode::Basic),
            "digest" => Ok(AuthMode::Digest),
            _ => Err(format!("Invalid auth type: {s}")),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::None => write!(f, "none"),
            AuthMode::Basic => write!(f, "basic"),
            AuthMode::Digest => write!(f, "digest"),
        }
    }
}

/// Request body sent in upload mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBody {
    pub content_type: String,
    pub content: Vec<u8>,
}

impl UploadBody {
    pub fn new(content_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// Everything needed to perform one request
///
/// Populated by a configuration layer (builder calls, CLI flags or a JSON
/// document) and handed to [`FetchEngine`](crate::FetchEngine) as an
/// immutable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RequestDescriptor {
    /// Target URL (required)
    pub url: String,

    /// Query or form parameters, in order
    pub params: Vec<Param>,

    /// Extra request headers, in order
    pub headers: Vec<Param>,

    /// HTTP method
    pub method: HttpMethod,

    /// Authentication scheme
    pub auth: AuthMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Allow intermediaries to serve a cached response
    pub use_caches: bool,

    /// Send If-Modified-Since from the destination file and copy the remote
    /// Last-Modified back onto it
    pub use_timestamp: bool,

    /// Turn transport and protocol failures into errors
    pub fail_on_error: bool,

    /// Treat statuses outside 200..=299 as failures
    pub use_response_code: bool,

    /// Transfer block size in KiB
    pub block_size_kb: usize,

    /// Save the body to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_file: Option<PathBuf>,

    /// Save the body to this property (ignored when `dest_file` is set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_property: Option<String>,

    /// Property set to "true" on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_property: Option<String>,

    /// Log timestamps and report progress
    pub verbose: bool,

    /// Explicit upload body
    #[serde(skip)]
    pub body: Option<UploadBody>,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            url: String::new(),
            params: Vec::new(),
            headers: Vec::new(),
            method: HttpMethod::Get,
            auth: AuthMode::None,
            username: None,
            password: None,
            use_caches: false,
            use_timestamp: false,
            fail_on_error: true,
            use_response_code: true,
            block_size_kb: DEFAULT_BLOCK_SIZE_KB,
            dest_file: None,
            dest_property: None,
            success_property: None,
            verbose: true,
            body: None,
        }
    }
}

impl RequestDescriptor {
    /// Create a new request with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the HTTP method
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Append a parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    /// Append a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Param::new(name, value));
        self
    }

    /// Set the authentication scheme
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Set the username; selects basic auth unless a scheme was chosen
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        if self.auth == AuthMode::None {
            self.auth = AuthMode::Basic;
        }
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn use_caches(mut self, use_caches: bool) -> Self {
        self.use_caches = use_caches;
        self
    }

    pub fn use_timestamp(mut self, use_timestamp: bool) -> Self {
        self.use_timestamp = use_timestamp;
        self
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn use_response_code(mut self, use_response_code: bool) -> Self {
        self.use_response_code = use_response_code;
        self
    }

    pub fn block_size_kb(mut self, block_size_kb: usize) -> Self {
        self.block_size_kb = block_size_kb;
        self
    }

    /// Save the response body to a file
    pub fn dest_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_file = Some(path.into());
        self
    }

    /// Save the response body to a property
    pub fn dest_property(mut self, name: impl Into<String>) -> Self {
        self.dest_property = Some(name.into());
        self
    }

    /// Name the property set to "true" on success
    pub fn success_property(mut self, name: impl Into<String>) -> Self {
        self.success_property = Some(name.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Send an explicit request body
    pub fn body(mut self, body: UploadBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Transfer block size in bytes (at least one KiB)
    pub fn block_size(&self) -> usize {
        self.block_size_kb.max(1) * 1024
    }
}

/// Result of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutcome {
    /// Final request URL, parameters included
    pub url: String,

    /// True when the transfer completed and passed classification
    pub succeeded: bool,

    /// HTTP status code, when one was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Body bytes received
    pub bytes_transferred: u64,

    /// Declared Content-Length, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,

    /// Why the execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// True when the server answered 304 to a conditional GET
    pub skipped_not_modified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_from_str() {
        assert_eq!(HttpMethod::from_str("GET").unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::from_str("get").unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::from_str("Post").unwrap(), HttpMethod::Post);
        assert_eq!(HttpMethod::from_str("head").unwrap(), HttpMethod::Head);
        assert!(HttpMethod::from_str("invalid").is_err());
    }

    #[test]
    fn test_http_method_body_rules() {
        assert!(HttpMethod::Post.sends_body());
        assert!(HttpMethod::Put.sends_body());
        assert!(!HttpMethod::Get.sends_body());
        assert!(!HttpMethod::Head.has_response_body());
        assert!(HttpMethod::Get.has_response_body());
    }

    #[test]
    fn test_auth_mode_parse_and_display() {
        assert_eq!(AuthMode::from_str("BASIC").unwrap(), AuthMode::Basic);
        assert_eq!(AuthMode::from_str("digest").unwrap(), AuthMode::Digest);
        assert!(AuthMode::from_str("ntlm").is_err());
        assert_eq!(AuthMode::Digest.to_string(), "digest");
    }

    #[test]
    fn test_descriptor_defaults() {
        let req = RequestDescriptor::new("https://example.com");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.auth, AuthMode::None);
        assert!(req.fail_on_error);
        assert!(req.use_response_code);
        assert!(!req.use_caches);
        assert!(!req.use_timestamp);
        assert!(req.verbose);
        assert_eq!(req.block_size_kb, 64);
        assert_eq!(req.block_size(), 64 * 1024);
    }

    #[test]
    fn test_username_selects_basic_auth() {
        let req = RequestDescriptor::new("https://example.com").username("alice");
        assert_eq!(req.auth, AuthMode::Basic);

        let req = RequestDescriptor::new("https://example.com")
            .auth(AuthMode::Digest)
            .username("alice");
        assert_eq!(req.auth, AuthMode::Digest);
    }

    #[test]
    fn test_block_size_floor() {
        let req = RequestDescriptor::new("https://example.com").block_size_kb(0);
        assert_eq!(req.block_size(), 1024);
    }

    #[test]
    fn test_descriptor_deserialize_with_defaults() {
        let json = r#"{
            "url": "https://example.com/data",
            "params": [{"name": "q", "value": "rust"}],
            "fail_on_error": false,
            "dest_property": "body"
        }"#;
        let req: RequestDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(req.url, "https://example.com/data");
        assert_eq!(req.params, vec![Param::new("q", "rust")]);
        assert!(!req.fail_on_error);
        assert!(req.use_response_code);
        assert_eq!(req.dest_property.as_deref(), Some("body"));
        assert_eq!(req.block_size_kb, 64);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = FetchOutcome {
            url: "https://example.com".to_string(),
            succeeded: true,
            status_code: Some(200),
            bytes_transferred: 5,
            ..Default::default()
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status_code\":200"));
        assert!(!json.contains("failure_reason"));
    }
}

//! GitHub REST API shapes
//!
//! All shapes issue GET requests below a configurable API root, so tests can
//! point them at a local server.

use serde_json::Value;

use super::Task;
use crate::engine::Hooks;
use crate::types::{HttpMethod, RequestDescriptor};

/// Public GitHub API root
pub const GITHUB_API_ROOT: &str = "https://api.github.com/";

/// Property that receives pull request patch URLs when none is configured
pub const DEFAULT_PULLS_PROPERTY: &str = "github.pulls";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Join an API root and a relative path with exactly one slash
fn endpoint(root: &str, path: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Descriptor for a GitHub GET, keeping caller settings
fn github_request(base: &RequestDescriptor, url: String) -> RequestDescriptor {
    let mut request = base.clone().method(HttpMethod::Get);
    request.url = url;
    if !request
        .headers
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case("accept"))
    {
        request = request.header("Accept", GITHUB_ACCEPT);
    }
    request
}

/// Content hook reducing a JSON array to the values of one field
///
/// Each element's `field` is emitted followed by a single space; elements
/// without the field are skipped. String values are emitted without quotes.
/// Fails when the body is not a JSON array.
pub fn json_field_list(field: &str) -> impl Fn(&str) -> Result<String, String> + Send + Sync {
    let field = field.to_string();
    move |body: &str| {
        let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
        let items = value
            .as_array()
            .ok_or_else(|| "expected a JSON array".to_string())?;

        let mut out = String::new();
        for item in items {
            match item.get(&field) {
                Some(Value::String(s)) => out.push_str(s),
                Some(Value::Null) | None => continue,
                Some(other) => out.push_str(&other.to_string()),
            }
            out.push(' ');
        }
        Ok(out)
    }
}

/// Open pull requests of a repository, reduced to their patch URLs
#[derive(Debug, Clone)]
pub struct GitPulls {
    api_root: String,
    user: String,
    repo: String,
    base: RequestDescriptor,
}

impl GitPulls {
    pub fn new(user: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            api_root: GITHUB_API_ROOT.to_string(),
            user: user.into(),
            repo: repo.into(),
            base: RequestDescriptor::default(),
        }
    }

    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    /// Adjust the underlying descriptor; URL and method are fixed
    pub fn configure(mut self, f: impl FnOnce(RequestDescriptor) -> RequestDescriptor) -> Self {
        self.base = f(self.base);
        self
    }
}

impl Task for GitPulls {
    fn name(&self) -> &'static str {
        "github-pulls"
    }

    fn descriptor(&self) -> RequestDescriptor {
        let url = endpoint(
            &self.api_root,
            &format!("repos/{}/{}/pulls", self.user, self.repo),
        );
        let mut request = github_request(&self.base, url);
        if request.dest_file.is_none() && request.dest_property.is_none() {
            request = request.dest_property(DEFAULT_PULLS_PROPERTY);
        }
        request
    }

    fn hooks(&self) -> Hooks {
        Hooks::new().process_content(json_field_list("patch_url"))
    }
}

/// The authenticated user's profile document
#[derive(Debug, Clone)]
pub struct GitUser {
    api_root: String,
    base: RequestDescriptor,
}

impl Default for GitUser {
    fn default() -> Self {
        Self::new()
    }
}

impl GitUser {
    pub fn new() -> Self {
        Self {
            api_root: GITHUB_API_ROOT.to_string(),
            base: RequestDescriptor::default(),
        }
    }

    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn configure(mut self, f: impl FnOnce(RequestDescriptor) -> RequestDescriptor) -> Self {
        self.base = f(self.base);
        self
    }
}

impl Task for GitUser {
    fn name(&self) -> &'static str {
        "github-user"
    }

    fn descriptor(&self) -> RequestDescriptor {
        github_request(&self.base, endpoint(&self.api_root, "user"))
    }
}

/// GET against the API root, carrying a comment that is not yet sent
#[derive(Debug, Clone)]
pub struct GitComment {
    api_root: String,
    comment: String,
    base: RequestDescriptor,
}

impl Default for GitComment {
    fn default() -> Self {
        Self::new()
    }
}

impl GitComment {
    pub fn new() -> Self {
        Self {
            api_root: GITHUB_API_ROOT.to_string(),
            comment: String::new(),
            base: RequestDescriptor::default(),
        }
    }

    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn comment_text(&self) -> &str {
        &self.comment
    }

    pub fn configure(mut self, f: impl FnOnce(RequestDescriptor) -> RequestDescriptor) -> Self {
        self.base = f(self.base);
        self
    }
}

impl Task for GitComment {
    fn name(&self) -> &'static str {
        "github-comment"
    }

    fn descriptor(&self) -> RequestDescriptor {
        github_request(&self.base, endpoint(&self.api_root, ""))
    }
}

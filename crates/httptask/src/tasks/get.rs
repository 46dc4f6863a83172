//! Plain GET and POST shapes

use super::Task;
use crate::engine::Hooks;
use crate::types::{HttpMethod, RequestDescriptor};

/// GET with parameters in the query string
#[derive(Debug, Clone)]
pub struct HttpGet {
    request: RequestDescriptor,
}

impl HttpGet {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            request: RequestDescriptor::new(url),
        }
    }

    /// Adjust the underlying descriptor; the method stays GET
    pub fn configure(mut self, f: impl FnOnce(RequestDescriptor) -> RequestDescriptor) -> Self {
        self.request = f(self.request);
        self
    }
}

impl Task for HttpGet {
    fn name(&self) -> &'static str {
        "get"
    }

    fn descriptor(&self) -> RequestDescriptor {
        self.request.clone().method(HttpMethod::Get)
    }
}

/// POST with parameters sent as `application/x-www-form-urlencoded`
#[derive(Debug, Clone)]
pub struct HttpPost {
    request: RequestDescriptor,
}

impl HttpPost {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            request: RequestDescriptor::new(url),
        }
    }

    /// Adjust the underlying descriptor; the method stays POST
    pub fn configure(mut self, f: impl FnOnce(RequestDescriptor) -> RequestDescriptor) -> Self {
        self.request = f(self.request);
        self
    }
}

impl Task for HttpPost {
    fn name(&self) -> &'static str {
        "post"
    }

    fn descriptor(&self) -> RequestDescriptor {
        self.request.clone().method(HttpMethod::Post)
    }

    fn hooks(&self) -> Hooks {
        Hooks::new().params_in_url(false)
    }
}

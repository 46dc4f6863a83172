//! Platform connection abstraction
//!
//! Design: the engine drives a [`Connection`] through the same stages a
//! blocking URL connection goes through (configure, connect, read status,
//! open body). [`HttpConnector`] provides the reqwest-backed implementation;
//! tests substitute their own to reproduce transport quirks.

mod http;

pub use http::{HttpConnection, HttpConnector};

use async_trait::async_trait;
use std::time::SystemTime;
use url::Url;

use crate::error::ConnectionError;
use crate::types::HttpMethod;

/// Opens connections for request URLs
pub trait Connector: Send + Sync {
    /// Unique identifier for this connector (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Create an unconnected connection to `url`
    fn open(&self, url: &Url) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// A single-use connection to one URL
///
/// Request configuration (`set_*`) must happen before [`connect`](Self::connect).
/// Reading status or body before connecting connects implicitly.
#[async_trait]
pub trait Connection: Send {
    /// Whether this is an HTTP connection (method selection, status codes)
    fn is_http(&self) -> bool;

    fn set_use_caches(&mut self, use_caches: bool);

    /// Set a request header, replacing any earlier value with the same name
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), ConnectionError>;

    fn set_method(&mut self, method: HttpMethod);

    /// Switch to output mode; the body is supplied through [`write`](Self::write)
    fn set_do_output(&mut self, do_output: bool);

    /// Perform the network round trip (or start it, in output mode)
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Send a block of the request body (output mode only)
    async fn write(&mut self, block: &[u8]) -> Result<(), ConnectionError>;

    /// Response status code
    async fn status(&mut self) -> Result<u16, ConnectionError>;

    /// Take the response body
    async fn body(&mut self) -> Result<Box<dyn BodyStream>, ConnectionError>;

    /// Response header value, once the response is available
    fn header(&self, name: &str) -> Option<String>;

    /// Declared Content-Length; absent or unparseable means unknown
    fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Remote Last-Modified time, if present and valid
    fn last_modified(&self) -> Option<SystemTime> {
        self.header("last-modified")
            .and_then(|v| httpdate::parse_http_date(v.trim()).ok())
    }
}

/// Response body reader
#[async_trait]
pub trait BodyStream: Send {
    /// Read into `buf`, returning the number of bytes read; 0 means exhausted
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError>;
}

//! HttpTask - configurable single-request HTTP fetch engine
//!
//! This crate performs one HTTP request described by a [`RequestDescriptor`]
//! and routes the response body to a file, a named property, or nowhere.
//! It supports query or form parameters, custom headers, basic
//! authentication, conditional GET against a local file's timestamp, block
//! uploads and per-block progress reporting.
//!
//! ## Request shapes
//!
//! Presets live in [`tasks`]; each supplies a descriptor and [`Hooks`] to a
//! [`FetchEngine`]:
//! - [`HttpGet`] / [`HttpPost`] - parameters in the URL or in a form body
//! - [`GitPulls`], [`GitUser`], [`GitComment`] - GitHub REST API requests
//!
//! ## Example
//!
//! ```no_run
//! use httptask::{FetchEngine, Properties, RequestDescriptor};
//!
//! # async fn demo() -> Result<(), httptask::FetchError> {
//! let engine = FetchEngine::builder().build()?;
//! let request = RequestDescriptor::new("https://example.com/")
//!     .param("q", "rust")
//!     .dest_property("page")
//!     .success_property("fetched");
//! let mut properties = Properties::new();
//! let outcome = engine.execute(&request, &mut properties).await?;
//! assert!(outcome.succeeded);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod connection;
mod engine;
mod error;
pub mod params;
pub mod probe;
mod properties;
mod sink;
pub mod tasks;
mod types;

pub use auth::AuthStrategy;
pub use connection::{BodyStream, Connection, Connector, HttpConnector};
pub use engine::{
    ConnectionHook, ContentHook, FetchEngine, FetchEngineBuilder, Hooks, Progress,
    FORM_CONTENT_TYPE,
};
pub use error::{ConnectionError, ErrorKind, FetchError};
pub use params::Param;
pub use properties::Properties;
pub use tasks::{GitComment, GitPulls, GitUser, HttpGet, HttpPost, Task};
pub use types::{AuthMode, FetchOutcome, HttpMethod, RequestDescriptor, UploadBody};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("HttpTask/", env!("CARGO_PKG_VERSION"));

/// Default transfer block size in KiB
pub const DEFAULT_BLOCK_SIZE_KB: usize = 64;

//! Error types for HttpTask

use std::path::PathBuf;
use thiserror::Error;

use crate::types::AuthMode;

/// Broad classification of a [`FetchError`]
///
/// Configuration errors are always fatal. Transport and protocol errors are
/// fatal only when the request has `fail_on_error` set; otherwise they are
/// reported through [`FetchOutcome`](crate::FetchOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
}

/// Errors that stop a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is missing
    #[error("target URL missing")]
    MissingUrl,

    /// URL could not be parsed after parameters were appended
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Header name or value cannot be sent
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Destination exists and is a directory
    #[error("The specified destination is a directory: {}", .0.display())]
    DestinationIsDirectory(PathBuf),

    /// Destination exists and is read-only
    #[error("Can't write to {}", .0.display())]
    DestinationNotWritable(PathBuf),

    /// Authentication selected without a username
    #[error("no username defined to use with authorisation")]
    MissingUsername,

    /// Authentication method has no implementation
    #[error("Authentication method {0} not supported")]
    UnsupportedAuth(AuthMode),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Network or disk failure while performing the request
    #[error("Error performing {method} on {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: ConnectionError,
    },

    /// Response received but judged a failure
    #[error("{0}")]
    Protocol(String),
}

impl FetchError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::MissingUrl
            | FetchError::InvalidUrl(_)
            | FetchError::InvalidHeader(_)
            | FetchError::DestinationIsDirectory(_)
            | FetchError::DestinationNotWritable(_)
            | FetchError::MissingUsername
            | FetchError::UnsupportedAuth(_) => ErrorKind::Configuration,
            FetchError::ClientBuildError(_) | FetchError::Transport { .. } => ErrorKind::Transport,
            FetchError::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// True for errors detected before any network I/O
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Errors raised by a [`Connection`](crate::connection::Connection)
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The transient "resource not found" condition some transports raise
    /// when status or body is first requested on a non-2xx response
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Connection used out of order (e.g. writing without output mode)
    #[error("Invalid connection state: {0}")]
    StateError(String),

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Local I/O failure (destination file, upload source)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectionError::Timeout
        } else if err.is_connect() {
            ConnectionError::ConnectError(err)
        } else {
            ConnectionError::RequestError(err.to_string())
        }
    }

    /// Whether this is the transient condition the probe swallows
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectionError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(FetchError::MissingUrl.to_string(), "target URL missing");
        assert_eq!(
            FetchError::MissingUsername.to_string(),
            "no username defined to use with authorisation"
        );
        assert_eq!(
            FetchError::UnsupportedAuth(AuthMode::Digest).to_string(),
            "Authentication method digest not supported"
        );
        assert_eq!(
            FetchError::DestinationNotWritable(PathBuf::from("/tmp/out.txt")).to_string(),
            "Can't write to /tmp/out.txt"
        );
        assert_eq!(
            FetchError::Protocol("Server error code 404 received".to_string()).to_string(),
            "Server error code 404 received"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(FetchError::MissingUrl.kind(), ErrorKind::Configuration);
        assert!(FetchError::UnsupportedAuth(AuthMode::Digest).is_configuration());
        assert_eq!(
            FetchError::Protocol("x".to_string()).kind(),
            ErrorKind::Protocol
        );
        let transport = FetchError::Transport {
            method: "GET".to_string(),
            url: "http://localhost/".to_string(),
            source: ConnectionError::Timeout,
        };
        assert_eq!(transport.kind(), ErrorKind::Transport);
        assert_eq!(
            transport.to_string(),
            "Error performing GET on http://localhost/: Request timed out"
        );
    }

    #[test]
    fn test_connection_error_messages() {
        assert_eq!(
            ConnectionError::RequestError("upload closed by server".to_string()).to_string(),
            "Request failed: upload closed by server"
        );
        assert_eq!(
            ConnectionError::StateError("connection closed".to_string()).to_string(),
            "Invalid connection state: connection closed"
        );
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(ConnectionError::NotFound("x".to_string()).is_not_found());
        assert!(!ConnectionError::Timeout.is_not_found());
        assert!(!ConnectionError::RequestError("x".to_string()).is_not_found());
    }
}

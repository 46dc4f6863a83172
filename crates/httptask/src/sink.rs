//! Destinations for the response body
//!
//! File handles are owned by the sink, so dropping it on any early return
//! closes them.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::types::RequestDescriptor;

/// Where streamed body bytes go
#[derive(Debug)]
pub enum ResponseSink {
    /// Destination file, truncated on open
    File { path: PathBuf, file: File },
    /// In-memory buffer exposed under a property name
    Buffer { property: String, buffer: Vec<u8> },
    /// Drop everything
    Discard,
}

/// Content held by a buffer sink after completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffered {
    pub property: String,
    pub content: String,
}

impl ResponseSink {
    /// Choose the sink for a request: file, then property, then discard
    pub async fn for_request(request: &RequestDescriptor) -> io::Result<Self> {
        if let Some(path) = &request.dest_file {
            debug!("Saving output to {}", path.display());
            return Self::file(path).await;
        }
        if let Some(property) = &request.dest_property {
            debug!("Saving output to property {}", property);
            return Ok(Self::buffer(property, request.block_size()));
        }
        Ok(ResponseSink::Discard)
    }

    pub async fn file(path: &Path) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(ResponseSink::File {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Buffer sink; `capacity` is only a sizing hint
    pub fn buffer(property: impl Into<String>, capacity: usize) -> Self {
        ResponseSink::Buffer {
            property: property.into(),
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub async fn write(&mut self, block: &[u8]) -> io::Result<()> {
        match self {
            ResponseSink::File { file, .. } => file.write_all(block).await,
            ResponseSink::Buffer { buffer, .. } => {
                buffer.extend_from_slice(block);
                Ok(())
            }
            ResponseSink::Discard => Ok(()),
        }
    }

    /// Flush and close; returns the buffered content for buffer sinks
    pub async fn finish(self) -> io::Result<Option<Buffered>> {
        match self {
            ResponseSink::File { mut file, path } => {
                file.flush().await?;
                debug!("Closed {}", path.display());
                Ok(None)
            }
            ResponseSink::Buffer { property, buffer } => Ok(Some(Buffered {
                property,
                content: String::from_utf8_lossy(&buffer).into_owned(),
            })),
            ResponseSink::Discard => Ok(None),
        }
    }
}

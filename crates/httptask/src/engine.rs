//! Fetch engine
//!
//! Runs one [`RequestDescriptor`] through verify, URL assembly, connection
//! setup, the conditional-GET shortcut, body streaming, post-processing and
//! outcome classification. Request shapes customise the run through
//! [`Hooks`] rather than by wrapping the engine.

use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::auth::AuthStrategy;
use crate::connection::{BodyStream, Connection, Connector, HttpConnector};
use crate::error::{ConnectionError, FetchError};
use crate::params::{build_url, encode_pairs};
use crate::probe::{resolve_body, resolve_status};
use crate::properties::Properties;
use crate::sink::ResponseSink;
use crate::types::{AuthMode, FetchOutcome, RequestDescriptor, UploadBody};

/// Content type of bodies built from request parameters
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const NOT_MODIFIED: u16 = 304;

/// Decides whether the run continues after a stage
pub type ConnectionHook = Arc<dyn Fn(&dyn Connection) -> bool + Send + Sync>;

/// Rewrites buffered body content before it is exposed
pub type ContentHook = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Extension points of a run
///
/// Defaults: parameters go in the URL, both connection hooks continue, and
/// buffered content is exposed unchanged.
#[derive(Clone)]
pub struct Hooks {
    params_in_url: bool,
    on_connected: Option<ConnectionHook>,
    on_download_finished: Option<ConnectionHook>,
    process_content: Option<ContentHook>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            params_in_url: true,
            on_connected: None,
            on_download_finished: None,
            process_content: None,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("params_in_url", &self.params_in_url)
            .field("on_connected", &self.on_connected.is_some())
            .field("on_download_finished", &self.on_download_finished.is_some())
            .field("process_content", &self.process_content.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append parameters to the URL (true) or send them as a form body
    pub fn params_in_url(mut self, params_in_url: bool) -> Self {
        self.params_in_url = params_in_url;
        self
    }

    /// Called after connecting; returning false ends the run unclassified
    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Connection) -> bool + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Called after the body is stored; returning false ends the run unclassified
    pub fn on_download_finished<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Connection) -> bool + Send + Sync + 'static,
    {
        self.on_download_finished = Some(Arc::new(hook));
        self
    }

    /// Transform buffered content before it is stored in the property
    pub fn process_content<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.process_content = Some(Arc::new(hook));
        self
    }

    pub fn adds_params_to_url(&self) -> bool {
        self.params_in_url
    }
}

/// Progress event, one per transferred block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Progress {
    Uploaded {
        block: usize,
        total: u64,
    },
    Downloaded {
        block: usize,
        total: u64,
        expected: Option<u64>,
    },
    Finished {
        total: u64,
    },
}

/// How a transfer ended, before classification
enum Flow {
    Completed,
    NotModified,
    /// A hook asked to stop
    Stopped,
}

/// Builder for configuring a [`FetchEngine`]
#[derive(Default)]
pub struct FetchEngineBuilder {
    user_agent: Option<String>,
    connector: Option<Arc<dyn Connector>>,
    hooks: Hooks,
}

impl FetchEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom User-Agent (ignored when a connector is supplied)
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Use a custom connector instead of the reqwest one
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<FetchEngine, FetchError> {
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new(self.user_agent.as_deref())?),
        };
        Ok(FetchEngine {
            connector,
            hooks: self.hooks,
        })
    }
}

/// Configured fetch engine
///
/// Holds no per-request state; every [`execute`](Self::execute) works on
/// its own descriptor snapshot and connection.
#[derive(Clone)]
pub struct FetchEngine {
    connector: Arc<dyn Connector>,
    hooks: Hooks,
}

impl std::fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEngine")
            .field("connector", &self.connector.name())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl FetchEngine {
    /// Create a new engine builder
    pub fn builder() -> FetchEngineBuilder {
        FetchEngineBuilder::new()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Check a request before any I/O; returns the auth strategy to use
    pub fn verify(&self, request: &RequestDescriptor) -> Result<AuthStrategy, FetchError> {
        if request.url.trim().is_empty() {
            return Err(FetchError::MissingUrl);
        }

        if let Some(path) = &request.dest_file {
            if let Ok(metadata) = std::fs::metadata(path) {
                if metadata.is_dir() {
                    return Err(FetchError::DestinationIsDirectory(path.clone()));
                }
                // Permission bits miss immutable files and read-only mounts
                let writable = !metadata.permissions().readonly()
                    && std::fs::OpenOptions::new().write(true).open(path).is_ok();
                if !writable {
                    return Err(FetchError::DestinationNotWritable(path.clone()));
                }
            }
        }

        if request.auth != AuthMode::None && request.username.is_none() {
            return Err(FetchError::MissingUsername);
        }

        for header in &request.headers {
            let valid = reqwest::header::HeaderName::from_bytes(header.name.as_bytes()).is_ok()
                && reqwest::header::HeaderValue::from_str(&header.value).is_ok();
            if !valid {
                return Err(FetchError::InvalidHeader(header.name.clone()));
            }
        }

        AuthStrategy::for_mode(request.auth)
    }

    /// Final request URL for a descriptor
    pub fn build_url(&self, request: &RequestDescriptor) -> Result<Url, FetchError> {
        build_url(&request.url, &request.params, self.hooks.params_in_url)
    }

    /// Execute a request, writing any properties into `properties`
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        properties: &mut Properties,
    ) -> Result<FetchOutcome, FetchError> {
        self.execute_with_progress(request, properties, |_| {}).await
    }

    /// Execute a request with per-block progress updates (when verbose)
    pub async fn execute_with_progress<F>(
        &self,
        request: &RequestDescriptor,
        properties: &mut Properties,
        mut progress: F,
    ) -> Result<FetchOutcome, FetchError>
    where
        F: FnMut(Progress),
    {
        let auth = self.verify(request)?;
        let url = self.build_url(request)?;

        let mut outcome = FetchOutcome {
            url: url.to_string(),
            ..Default::default()
        };

        let flow = self
            .transfer(request, &url, auth, properties, &mut outcome, &mut progress)
            .await;

        match flow {
            Ok(Flow::Stopped) => Ok(outcome),
            Ok(Flow::NotModified) => {
                info!("Local file is up to date - so nothing was downloaded");
                outcome.skipped_not_modified = true;
                self.report(request, outcome, properties)
            }
            Ok(Flow::Completed) => self.report(request, outcome, properties),
            Err(source) => {
                let err = FetchError::Transport {
                    method: request.method.to_string(),
                    url: url.to_string(),
                    source,
                };
                error!("{}", err);
                if request.fail_on_error {
                    return Err(err);
                }
                outcome.failure_reason = Some(err.to_string());
                Ok(outcome)
            }
        }
    }

    async fn transfer<F>(
        &self,
        request: &RequestDescriptor,
        url: &Url,
        auth: AuthStrategy,
        properties: &mut Properties,
        outcome: &mut FetchOutcome,
        progress: &mut F,
    ) -> Result<Flow, ConnectionError>
    where
        F: FnMut(Progress),
    {
        let mut connection = self.connector.open(url)?;
        connection.set_use_caches(request.use_caches);

        let local_timestamp = local_timestamp(request).await;
        if let Some(timestamp) = local_timestamp {
            let date = httpdate::fmt_http_date(timestamp);
            if request.verbose {
                info!("local file date : {}", date);
            }
            connection.set_header("If-Modified-Since", &date)?;
        }

        if let Some((name, value)) =
            auth.header(request.username.as_deref(), request.password.as_deref())
        {
            connection.set_header(name, &value)?;
        }

        for header in &request.headers {
            connection.set_header(&header.name, &header.value)?;
        }

        if connection.is_http() {
            connection.set_method(request.method);
        }

        info!("making {} to {}", request.method, url);

        match self.upload_body(request) {
            Some(body) => {
                connect_with_upload(connection.as_mut(), request, &body, progress).await?;
            }
            None => {
                debug!("Connecting to {} via {}", url, self.connector.name());
                connection.connect().await?;
                debug!("connected");
            }
        }

        if let Some(hook) = &self.hooks.on_connected {
            if !hook(connection.as_ref()) {
                debug!("on_connected hook stopped the run");
                return Ok(Flow::Stopped);
            }
        }

        if connection.is_http() && local_timestamp.is_some() {
            let status = resolve_status(connection.as_mut()).await?;
            outcome.status_code = Some(status);
            if status == NOT_MODIFIED {
                return Ok(Flow::NotModified);
            }
        }

        let mut body = resolve_body(connection.as_mut()).await?;
        let mut sink = ResponseSink::for_request(request).await?;

        // Read once, before the loop. A HEAD response declares the length of
        // a body it never sends.
        let content_length = if request.method.has_response_body() {
            connection.content_length()
        } else {
            None
        };
        outcome.content_length = content_length;

        let mut block = vec![0u8; request.block_size()];
        let mut transferred = 0u64;
        loop {
            if content_length.is_some_and(|expected| transferred >= expected) {
                break;
            }
            let read = read_block(body.as_mut(), &mut block).await?;
            if read == 0 {
                break;
            }
            sink.write(&block[..read]).await?;
            transferred += read as u64;
            outcome.bytes_transferred = transferred;
            if request.verbose {
                progress(Progress::Downloaded {
                    block: read,
                    total: transferred,
                    expected: content_length,
                });
            }
        }
        if request.verbose {
            progress(Progress::Finished { total: transferred });
        }
        drop(body);

        if let Some(buffered) = sink.finish().await? {
            let content = self.process_content(buffered.content);
            properties.set(buffered.property, content);
        }

        if let Some(hook) = &self.hooks.on_download_finished {
            if !hook(connection.as_ref()) {
                debug!("on_download_finished hook stopped the run");
                return Ok(Flow::Stopped);
            }
        }

        if request.use_timestamp {
            if let Some(path) = &request.dest_file {
                propagate_timestamp(path, connection.last_modified(), request.verbose).await?;
            }
        }

        let status = if connection.is_http() {
            match outcome.status_code {
                Some(status) => Some(status),
                None => Some(resolve_status(connection.as_mut()).await?),
            }
        } else {
            None
        };
        outcome.status_code = status;
        outcome.failure_reason = classify(
            content_length,
            transferred,
            status.filter(|_| request.use_response_code),
        );

        Ok(Flow::Completed)
    }

    /// Body to upload: explicit, or the parameters when they skip the URL
    fn upload_body<'a>(&self, request: &'a RequestDescriptor) -> Option<Cow<'a, UploadBody>> {
        if let Some(body) = &request.body {
            return Some(Cow::Borrowed(body));
        }
        if request.method.sends_body() && !self.hooks.params_in_url && !request.params.is_empty() {
            return Some(Cow::Owned(UploadBody::new(
                FORM_CONTENT_TYPE,
                encode_pairs(&request.params),
            )));
        }
        None
    }

    fn process_content(&self, content: String) -> String {
        let Some(hook) = &self.hooks.process_content else {
            return content;
        };
        match hook(&content) {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, "Content hook failed, keeping raw body");
                content
            }
        }
    }

    fn report(
        &self,
        request: &RequestDescriptor,
        mut outcome: FetchOutcome,
        properties: &mut Properties,
    ) -> Result<FetchOutcome, FetchError> {
        match &outcome.failure_reason {
            None => {
                outcome.succeeded = true;
                if let Some(name) = request.success_property.as_deref().filter(|n| !n.is_empty()) {
                    properties.set(name, "true");
                }
                Ok(outcome)
            }
            Some(reason) if request.fail_on_error => Err(FetchError::Protocol(reason.clone())),
            Some(reason) => {
                error!("{}", reason);
                Ok(outcome)
            }
        }
    }
}

/// Failure reason for a finished transfer, if any
///
/// `status` is only supplied when status codes are checked.
fn classify(content_length: Option<u64>, transferred: u64, status: Option<u16>) -> Option<String> {
    if let Some(expected) = content_length {
        if transferred != expected {
            return Some(format!(
                "Incomplete download -Expected {expected} received {transferred} bytes"
            ));
        }
    }
    match status {
        Some(code) if !(200..=299).contains(&code) => {
            Some(format!("Server error code {code} received"))
        }
        _ => None,
    }
}

/// Fill `buf` from `body`, short only at end of stream
async fn read_block(body: &mut dyn BodyStream, buf: &mut [u8]) -> Result<usize, ConnectionError> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = body.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

async fn connect_with_upload<F>(
    connection: &mut dyn Connection,
    request: &RequestDescriptor,
    body: &UploadBody,
    progress: &mut F,
) -> Result<(), ConnectionError>
where
    F: FnMut(Progress),
{
    let length = body.content.len();
    trace!("uploading {} bytes of type {}", length, body.content_type);

    connection.set_do_output(true);
    connection.set_header("Content-Length", &length.to_string())?;
    connection.set_header("Content-Type", &body.content_type)?;
    connection.connect().await?;

    let block_size = request.block_size().min(length.max(1));
    let mut sent = 0u64;
    for block in body.content.chunks(block_size) {
        debug!("block of {}", block.len());
        connection.write(block).await?;
        sent += block.len() as u64;
        if request.verbose {
            progress(Progress::Uploaded {
                block: block.len(),
                total: sent,
            });
        }
    }
    debug!("upload completed");
    Ok(())
}

/// Modification time of the destination, when timestamps are in use
async fn local_timestamp(request: &RequestDescriptor) -> Option<SystemTime> {
    if !request.use_timestamp {
        return None;
    }
    let path = request.dest_file.as_ref()?;
    // Epoch stands for "no timestamp", so no condition is sent for it
    tokio::fs::metadata(path)
        .await
        .ok()?
        .modified()
        .ok()
        .filter(|mtime| *mtime != SystemTime::UNIX_EPOCH)
}

/// Copy the remote Last-Modified onto the saved file
async fn propagate_timestamp(
    path: &Path,
    remote: Option<SystemTime>,
    verbose: bool,
) -> Result<(), ConnectionError> {
    let Some(time) = remote else {
        if verbose {
            info!("last modified = unknown - using current time instead");
        }
        return Ok(());
    };
    if verbose {
        info!("last modified = {}", httpdate::fmt_http_date(time));
    }
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await?
        .into_std()
        .await;
    file.set_modified(time)?;
    Ok(())
}

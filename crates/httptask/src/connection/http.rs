//! reqwest-backed connections
//!
//! The request is sent on `connect`. In output mode the body is streamed
//! through a channel into a spawned `send`, and the response is awaited
//! when status or body is first requested.

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, USER_AGENT};
use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use super::{BodyStream, Connection, Connector};
use crate::error::{ConnectionError, FetchError};
use crate::types::HttpMethod;
use crate::DEFAULT_USER_AGENT;

/// Upload blocks buffered ahead of the sender
const UPLOAD_CHANNEL_DEPTH: usize = 4;

/// Connector for http:// and https:// URLs
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Create a connector with its own client
    pub fn new(user_agent: Option<&str>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = user_agent.unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Connector for HttpConnector {
    fn name(&self) -> &'static str {
        "http"
    }

    fn open(&self, url: &Url) -> Result<Box<dyn Connection>, ConnectionError> {
        match url.scheme() {
            "http" | "https" => Ok(Box::new(HttpConnection::new(
                self.client.clone(),
                url.clone(),
            ))),
            other => Err(ConnectionError::RequestError(format!(
                "unsupported protocol: {other}"
            ))),
        }
    }
}

type UploadSender = mpsc::Sender<Result<Bytes, std::io::Error>>;

enum State {
    Configuring,
    Uploading {
        sender: UploadSender,
        pending: JoinHandle<Result<reqwest::Response, reqwest::Error>>,
    },
    /// Response received; `None` once the body has been taken
    Received(Option<reqwest::Response>),
    Closed,
}

/// One HTTP exchange
pub struct HttpConnection {
    client: reqwest::Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    use_caches: bool,
    do_output: bool,
    state: State,
    status: Option<u16>,
    response_headers: HeaderMap,
}

impl HttpConnection {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self {
            client,
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            use_caches: false,
            do_output: false,
            state: State::Configuring,
            status: None,
            response_headers: HeaderMap::new(),
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let mut headers = self.headers.clone();
        if !self.use_caches && !headers.contains_key(CACHE_CONTROL) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        self.client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
    }

    fn receive(&mut self, response: reqwest::Response) {
        debug!(status = response.status().as_u16(), url = %self.url, "Response received");
        self.status = Some(response.status().as_u16());
        self.response_headers = response.headers().clone();
        self.state = State::Received(Some(response));
    }

    async fn ensure_response(&mut self) -> Result<(), ConnectionError> {
        if matches!(self.state, State::Configuring) {
            self.connect().await?;
        }

        match std::mem::replace(&mut self.state, State::Closed) {
            State::Uploading { sender, pending } => {
                // Closing the channel ends the request body
                drop(sender);
                let response = pending
                    .await
                    .map_err(|e| ConnectionError::RequestError(e.to_string()))?
                    .map_err(ConnectionError::from_reqwest)?;
                self.receive(response);
                Ok(())
            }
            State::Closed => Err(ConnectionError::StateError("connection closed".to_string())),
            other => {
                self.state = other;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn is_http(&self) -> bool {
        true
    }

    fn set_use_caches(&mut self, use_caches: bool) {
        self.use_caches = use_caches;
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), ConnectionError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConnectionError::RequestError(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ConnectionError::RequestError(format!("invalid value for header {name}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn set_method(&mut self, method: HttpMethod) {
        self.method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Options => Method::OPTIONS,
        };
    }

    fn set_do_output(&mut self, do_output: bool) {
        self.do_output = do_output;
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if !matches!(self.state, State::Configuring) {
            return Ok(());
        }

        if self.do_output {
            let (sender, receiver) = mpsc::channel(UPLOAD_CHANNEL_DEPTH);
            let request = self.request().body(reqwest::Body::wrap_stream(receiver));
            let pending = tokio::spawn(request.send());
            self.state = State::Uploading { sender, pending };
            return Ok(());
        }

        self.state = State::Closed;
        let response = self
            .request()
            .send()
            .await
            .map_err(ConnectionError::from_reqwest)?;
        self.receive(response);
        Ok(())
    }

    async fn write(&mut self, block: &[u8]) -> Result<(), ConnectionError> {
        match &mut self.state {
            State::Uploading { sender, .. } => sender
                .send(Ok(Bytes::copy_from_slice(block)))
                .await
                .map_err(|_| ConnectionError::RequestError("upload closed by server".to_string())),
            _ => Err(ConnectionError::StateError(
                "connection is not in output mode".to_string(),
            )),
        }
    }

    async fn status(&mut self) -> Result<u16, ConnectionError> {
        self.ensure_response().await?;
        self.status
            .ok_or_else(|| ConnectionError::StateError("no response".to_string()))
    }

    async fn body(&mut self) -> Result<Box<dyn BodyStream>, ConnectionError> {
        self.ensure_response().await?;
        match &mut self.state {
            State::Received(response) => response
                .take()
                .map(|response| {
                    Box::new(ResponseBody {
                        response,
                        pending: Bytes::new(),
                    }) as Box<dyn BodyStream>
                })
                .ok_or_else(|| ConnectionError::StateError("response body already taken".to_string())),
            _ => Err(ConnectionError::StateError("no response".to_string())),
        }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.response_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

/// Body reader over reqwest's chunked response
struct ResponseBody {
    response: reqwest::Response,
    pending: Bytes,
}

#[async_trait]
impl BodyStream for ResponseBody {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        while self.pending.is_empty() {
            match self
                .response
                .chunk()
                .await
                .map_err(ConnectionError::from_reqwest)?
            {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }
}

//! HTTP client for the sandbox API.
//!
//! Endpoints: `POST /api/exec`, `POST /api/reset`, `POST /api/health`,
//! plus the websocket URL for `/api/ws`.

pub mod error;
pub mod sse;
pub mod warmup;

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub use self::error::{SandboxError, SandboxErrorKind, SandboxResult};
pub use self::sse::{SseDecoder, SseEventStream, StreamEvent};

const EVENT_STREAM: &str = "text/event-stream";

/// Result of a request/response command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
}

/// Outcome of `POST /api/reset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetResponse {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResetResponse {
    success: Option<bool>,
    message: Option<String>,
}

/// Event stream of a streaming exec.
pub type EventStream = SseEventStream<BoxStream<'static, reqwest::Result<Bytes>>>;

/// What a streaming exec produced.
pub enum ExecStream {
    /// The server answered with plain JSON instead of an event stream.
    Json(ExecResult),
    Events(EventStream),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecRequest<'a> {
    command: &'a str,
    session_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest<'a> {
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tab_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct SandboxClient {
    base_url: Url,
    session_id: String,
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl SandboxClient {
    pub fn new(base_url: Url, session_id: impl Into<String>) -> Self {
        Self {
            base_url,
            session_id: session_id.into(),
            http: reqwest::Client::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    fn post(&self, path: &str, body: &impl Serialize) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.endpoint(path)).json(body);
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Runs a command and waits for the JSON result.
    ///
    /// # Errors
    /// Transport failures, non-2xx responses (body text as message) and
    /// unparseable bodies.
    pub async fn exec(&self, command: &str) -> SandboxResult<ExecResult> {
        let request = ExecRequest {
            command,
            session_id: &self.session_id,
        };
        tracing::debug!(command, "exec");
        let response = self.post("/api/exec", &request).send().await?;
        parse_json_response(response).await
    }

    /// Runs a command asking for an event stream.
    ///
    /// The configured timeout bounds only the wait for response headers.
    ///
    /// # Errors
    /// Same as [`SandboxClient::exec`] for the initial response.
    pub async fn exec_streaming(&self, command: &str) -> SandboxResult<ExecStream> {
        let request = ExecRequest {
            command,
            session_id: &self.session_id,
        };
        tracing::debug!(command, "exec (streaming)");
        let send = self
            .http
            .post(self.endpoint("/api/exec"))
            .header(reqwest::header::ACCEPT, EVENT_STREAM)
            .json(&request)
            .send();
        let response = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, send).await.map_err(|elapsed| {
                SandboxError::timeout(format!("Request timed out: {elapsed}"))
            })??,
            None => send.await?,
        };

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains(EVENT_STREAM));
        if !is_event_stream {
            return parse_json_response(response).await.map(ExecStream::Json);
        }

        Ok(ExecStream::Events(SseEventStream::new(
            response.bytes_stream().boxed(),
        )))
    }

    /// Asks the server to tear the sandbox down.
    ///
    /// # Errors
    /// Transport failures, or a body that is neither JSON nor a success.
    pub async fn reset(&self, tab_id: Option<&str>) -> SandboxResult<ResetResponse> {
        let request = SessionRequest {
            session_id: &self.session_id,
            tab_id,
        };
        let response = self.post("/api/reset", &request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<RawResetResponse>(&text) {
            Ok(raw) => Ok(ResetResponse {
                success: raw.success.unwrap_or(status.is_success()),
                message: raw.message,
            }),
            Err(_) if !status.is_success() => {
                Err(SandboxError::http_status(status.as_u16(), &text))
            }
            Err(err) => Err(SandboxError::malformed_json(&err)),
        }
    }

    /// Keep-alive ping.
    ///
    /// # Errors
    /// Transport failures and non-2xx responses.
    pub async fn health(&self, tab_id: &str) -> SandboxResult<()> {
        let request = SessionRequest {
            session_id: &self.session_id,
            tab_id: Some(tab_id),
        };
        let response = self.post("/api/health", &request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SandboxError::http_status(status.as_u16(), &body));
        }
        Ok(())
    }

    /// `ws(s)://<host>/api/ws?sessionId=<id>`
    ///
    /// # Errors
    /// Returns an error if the base URL has no websocket equivalent.
    pub fn websocket_url(&self) -> SandboxResult<Url> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(SandboxError::new(
                    SandboxErrorKind::Parse,
                    format!("Unsupported URL scheme for websocket: {other}"),
                ));
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            SandboxError::new(SandboxErrorKind::Parse, "Failed to build websocket URL")
        })?;
        let path = format!("{}/api/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("sessionId", &self.session_id);
        Ok(url)
    }
}

async fn parse_json_response<T: DeserializeOwned>(response: reqwest::Response) -> SandboxResult<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(SandboxError::http_status(status.as_u16(), &text));
    }
    serde_json::from_str(&text).map_err(|err| SandboxError::malformed_json(&err))
}

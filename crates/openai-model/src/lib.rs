//! A model provider for OpenAI-compatible chat-completion APIs.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use parley_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use reqwest::{Client, Response, StatusCode, header};
use serde_json::Value;
use tokio::time::timeout;

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, ChunksError, Sse, SseError};
use proto::ChatCompletion;
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    payload: Option<Value>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            payload: None,
        }
    }

    /// Makes an unrecoverable error from an `{"error": ...}` document.
    fn from_error_body(payload: Value) -> Self {
        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("the server returned an error")
            .to_owned();
        Self {
            message,
            kind: ErrorKind::Remote,
            payload: Some(payload),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

impl From<ChunksError> for Error {
    fn from(err: ChunksError) -> Self {
        match err {
            ChunksError::Transport(message) => {
                Error::new(message, ErrorKind::Transient)
            }
            ChunksError::TimedOut(window) => Error::new(
                format!("no data received within {window:?}"),
                ErrorKind::Transient,
            ),
        }
    }
}

impl From<SseError> for Error {
    fn from(err: SseError) -> Self {
        match err {
            SseError::ChunksError(err) => err.into(),
            SseError::InvalidPayload => {
                Error::new("stream is not valid UTF-8", ErrorKind::Protocol)
            }
            SseError::UnexpectedLine(line) => Error::new(
                format!("unexpected line in stream: {line}"),
                ErrorKind::Protocol,
            ),
            SseError::ErrorObject(body) => error_from_body(body.as_bytes()),
        }
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let stream = req.stream;
        let unresponsive_timeout = self.config.unresponsive_timeout;
        trace!("sending request: {openai_req:?}");
        let resp_fut = self
            .client
            .post(self.config.completions_url())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::ACCEPT,
                if stream {
                    "text/event-stream"
                } else {
                    "application/json"
                },
            )
            .json(&openai_req)
            .send();

        async move {
            let resp_or_err = match unresponsive_timeout {
                Some(window) => timeout(window, resp_fut).await.map_err(|_| {
                    Error::new(
                        format!("no response within {window:?}"),
                        ErrorKind::Transient,
                    )
                })?,
                None => resp_fut.await,
            };
            let resp = resp_or_err.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transient)
            })?;

            let status = resp.status();
            let is_json = is_json_response(&resp);
            let mut chunks = Chunks::from_response(resp, unresponsive_timeout);
            if !status.is_success() {
                let body = read_error_body(&mut chunks).await;
                return Err(error_from_status(status, &body));
            }

            if !stream {
                let body = chunks.read_to_end().await?;
                return completion_from_body(&body)
                    .map(OpenAIResponse::from_completion);
            }

            if is_json {
                // The server refused to stream and sent a document instead.
                let body = chunks.read_to_end().await?;
                return Err(error_from_body(&body));
            }

            // Here we got a successful response.
            Ok(OpenAIResponse::from_sse(Sse::new(chunks)))
        }
    }
}

fn is_json_response(resp: &Response) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.type_() == mime::APPLICATION && m.subtype() == mime::JSON
        })
        .unwrap_or(false)
}

fn completion_from_body(body: &[u8]) -> Result<ChatCompletion, Error> {
    let value = serde_json::from_slice::<Value>(body).map_err(|err| {
        Error::new(format!("malformed response: {err}"), ErrorKind::Protocol)
    })?;
    if value.get("error").is_some() {
        return Err(Error::from_error_body(value));
    }
    serde_json::from_value(value).map_err(|err| {
        Error::new(format!("invalid response: {err}"), ErrorKind::Protocol)
    })
}

/// Classifies a JSON document received in place of a stream.
fn error_from_body(body: &[u8]) -> Error {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Error::from_error_body(value),
        Err(_) => Error {
            message: String::from_utf8_lossy(body).into_owned(),
            kind: ErrorKind::Remote,
            payload: None,
        },
    }
}

/// Reads the body of a failed response, which is only used to enrich the
/// error, so a failed read leaves it empty.
async fn read_error_body(chunks: &mut Chunks) -> Vec<u8> {
    chunks.read_to_end().await.unwrap_or_else(|err| {
        warn!("failed to read the error body: {err:?}");
        vec![]
    })
}

/// Classifies a response with a non-success status.
///
/// Client errors are unrecoverable except request timeouts and rate
/// limits, everything else may succeed on a later attempt.
fn error_from_status(status: StatusCode, body: &[u8]) -> Error {
    let kind = match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ErrorKind::Transient
        }
        s if s.is_client_error() => ErrorKind::Remote,
        _ => ErrorKind::Transient,
    };
    let payload = serde_json::from_slice::<Value>(body).ok();
    let message = payload
        .as_ref()
        .and_then(|p| p.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(|m| format!("{status}: {m}"))
        .unwrap_or_else(|| format!("{status}"));
    warn!("request failed with {status}");
    Error {
        message,
        kind,
        payload,
    }
}

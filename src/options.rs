use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{query::Query, retry::Retry, transport::FormData, Result, SplashError};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configures client-wide timeout and retry behavior.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry setting used when a call does not override it.
    pub retry: Retry,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: Retry::Disabled,
        }
    }
}

impl ClientOptions {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }
}

/// Shape of a successful result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Parsed JSON; nothing on `204 No Content`.
    #[default]
    Json,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// The response itself, undecoded.
    Raw,
}

/// Request body before serialization.
///
/// JSON values are serialized according to the effective `content-type`: JSON
/// by default, a URL-encoded form for `application/x-www-form-urlencoded`, and
/// as-is text for a JSON string under any other content type.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    /// Sent as `multipart/form-data`; any `content-type` header is dropped.
    Multipart(FormData),
    /// Sent unchanged.
    Raw(Bytes),
}

impl Body {
    /// Serializes any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value).map(Self::Json).map_err(|err| {
            SplashError::api_with_source("invalid_body", "body is not serializable", err)
        })
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<FormData> for Body {
    fn from(form: FormData) -> Self {
        Self::Multipart(form)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes.into())
    }
}

/// Describes one logical call.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Relative to the client's base URL, or absolute when it starts with `http`.
    pub path: String,
    pub method: Method,
    pub query: Query,
    /// Per-call headers; override client headers with the same name.
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Cancels the call, including a pending backoff sleep.
    pub cancel: Option<CancellationToken>,
    /// Overrides the client timeout for every attempt of this call.
    pub timeout_ms: Option<u64>,
    /// Overrides the client retry setting.
    pub retry: Option<Retry>,
    pub response_type: ResponseType,
}

impl RequestOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        Ok(self.body(Body::json(value)?))
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }
}

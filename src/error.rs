use std::time::Duration;

use reqwest::Method;

use crate::transport::HttpResponse;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Body of a failed response, parsed as JSON when possible.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorBody {
    /// The body was valid JSON.
    Json(serde_json::Value),
    /// The body was not JSON; raw (lossy UTF-8) text.
    Text(String),
}

impl ErrorBody {
    /// Best-effort parse; never fails.
    pub(crate) fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes)
            .map(Self::Json)
            .unwrap_or_else(|_| Self::Text(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Returns the JSON value if the body parsed as JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Details of a response whose status indicates failure.
#[derive(Clone, Debug)]
pub struct HttpError {
    /// Human readable summary, e.g. `HTTP 404 Not Found`.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// Request URL, including the query string.
    pub url: String,
    /// Request method.
    pub method: Method,
    /// Parsed response body.
    pub body: ErrorBody,
    /// The full response as seen after response interceptors.
    pub response: HttpResponse,
}

/// Error type returned by this crate.
///
/// Every failure surfaced by the request pipeline is one of these four kinds.
#[derive(Debug, thiserror::Error)]
pub enum SplashError {
    /// Generic API error: configuration, invalid input, transport failure,
    /// caller cancellation, interceptor failure or response decoding.
    #[error("{message}")]
    Api {
        /// Error message.
        message: String,
        /// Machine readable code such as `network` or `aborted`.
        code: Option<String>,
        /// Optional structured details.
        details: Option<serde_json::Value>,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },
    /// The attempt exceeded its own deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// Non-success HTTP status.
    #[error("{}", .0.message)]
    Http(HttpError),
    /// HTTP 429 with the server-requested delay, if any.
    #[error("{}", .error.message)]
    RateLimit {
        /// Response details.
        error: HttpError,
        /// Delay computed from the `retry-after` header.
        retry_after: Option<Duration>,
    },
}

impl SplashError {
    pub(crate) fn api(code: &str, message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: Some(code.to_owned()),
            details: None,
            source: None,
        }
    }

    pub(crate) fn api_with_source(
        code: &str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Api {
            message: message.into(),
            code: Some(code.to_owned()),
            details: None,
            source: Some(source.into()),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::api("config", message)
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::api("invalid_argument", message)
    }

    pub(crate) fn aborted() -> Self {
        Self::api("aborted", "request was cancelled")
    }

    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Self::api_with_source("network", format!("transport error: {err}"), err)
    }

    /// Errors returned by interceptors are surfaced as generic API errors so the
    /// retry layer never re-runs them. Generic API errors pass through as-is.
    pub(crate) fn interceptor(err: SplashError) -> Self {
        match err {
            err @ Self::Api { .. } => err,
            other => Self::api_with_source("interceptor", format!("interceptor failed: {other}"), other),
        }
    }

    pub(crate) fn decode(err: impl Into<BoxError>) -> Self {
        let err = err.into();
        Self::api_with_source("decode", format!("could not decode response: {err}"), err)
    }

    /// HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        self.as_http().map(|http| http.status)
    }

    /// Machine readable error code.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::Timeout { .. } => Some("timeout"),
            Self::Http(_) => None,
            Self::RateLimit { .. } => Some("rate_limited"),
        }
    }

    /// HTTP details for both [`SplashError::Http`] and [`SplashError::RateLimit`].
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(error) | Self::RateLimit { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Delay requested by the server on a 429 response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}

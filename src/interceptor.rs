//! Request and response interceptors.
//!
//! Interceptors take the current value by ownership and return the value that
//! continues down the chain, so the caller's copy is never mutated in place.
//! Plain closures implement both traits.

use async_trait::async_trait;

use crate::{
    transport::{HttpRequest, HttpResponse},
    Result,
};

/// Transforms an outgoing request before dispatch.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: HttpRequest) -> Result<HttpRequest>;
}

/// Transforms a response before status classification.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn intercept(&self, response: HttpResponse, request: &HttpRequest)
        -> Result<HttpResponse>;
}

#[async_trait]
impl<F> RequestInterceptor for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest> + Send + Sync,
{
    async fn intercept(&self, request: HttpRequest) -> Result<HttpRequest> {
        self(request)
    }
}

#[async_trait]
impl<F> ResponseInterceptor for F
where
    F: Fn(HttpResponse, &HttpRequest) -> Result<HttpResponse> + Send + Sync,
{
    async fn intercept(
        &self,
        response: HttpResponse,
        request: &HttpRequest,
    ) -> Result<HttpResponse> {
        self(response, request)
    }
}

/// Logs requests and responses through `tracing`.
///
/// Register it as both a request and a response interceptor. Header values are
/// never logged; only names at `trace` level when enabled.
#[cfg(feature = "tracing")]
#[derive(Clone, Debug, Default)]
pub struct LoggingInterceptor {
    log_headers: bool,
}

#[cfg(feature = "tracing")]
impl LoggingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log header names.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

#[cfg(feature = "tracing")]
#[async_trait]
impl RequestInterceptor for LoggingInterceptor {
    async fn intercept(&self, request: HttpRequest) -> Result<HttpRequest> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = request.attempt,
            "sending request"
        );
        if self.log_headers {
            for name in request.headers.keys() {
                tracing::trace!(header = %name, "request header");
            }
        }
        Ok(request)
    }
}

#[cfg(feature = "tracing")]
#[async_trait]
impl ResponseInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        response: HttpResponse,
        request: &HttpRequest,
    ) -> Result<HttpResponse> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = response.status.as_u16(),
            bytes = response.body.len(),
            "received response"
        );
        if self.log_headers {
            for name in response.headers.keys() {
                tracing::trace!(header = %name, "response header");
            }
        }
        Ok(response)
    }
}

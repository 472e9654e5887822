use std::{fmt, sync::Arc};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::{interceptor::RequestInterceptor, transport::HttpRequest, Result, SplashError};

/// Supplies credentials by producing a request interceptor.
///
/// Strategies registered on a client run after caller-supplied request
/// interceptors, in registration order.
pub trait AuthStrategy: Send + Sync {
    fn as_request_interceptor(&self) -> Arc<dyn RequestInterceptor>;
}

/// Sets a fixed header, e.g. `Authorization: Client-ID <access key>`.
#[derive(Clone)]
pub struct ApiKeyAuth {
    header: String,
    key: String,
}

impl ApiKeyAuth {
    pub fn new(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header", &self.header)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl RequestInterceptor for ApiKeyAuth {
    async fn intercept(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        let name = HeaderName::from_bytes(self.header.as_bytes()).map_err(|err| {
            SplashError::api_with_source(
                "invalid_header",
                format!("invalid auth header name '{}'", self.header),
                err,
            )
        })?;
        set_credential(&mut request.headers, name, &self.key)?;
        Ok(request)
    }
}

impl AuthStrategy for ApiKeyAuth {
    fn as_request_interceptor(&self) -> Arc<dyn RequestInterceptor> {
        Arc::new(self.clone())
    }
}

/// Sets `authorization: Bearer <token>`.
///
/// If the token already carries the `Bearer ` prefix it is kept as-is.
#[derive(Clone)]
pub struct BearerTokenAuth {
    authorization: String,
}

impl BearerTokenAuth {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            authorization: bearer_authorization(token.as_ref()),
        }
    }
}

impl fmt::Debug for BearerTokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuth")
            .field("authorization", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl RequestInterceptor for BearerTokenAuth {
    async fn intercept(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        set_credential(&mut request.headers, AUTHORIZATION, &self.authorization)?;
        Ok(request)
    }
}

impl AuthStrategy for BearerTokenAuth {
    fn as_request_interceptor(&self) -> Arc<dyn RequestInterceptor> {
        Arc::new(self.clone())
    }
}

fn set_credential(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<()> {
    let mut value = HeaderValue::from_str(value).map_err(|err| {
        SplashError::api_with_source(
            "invalid_header",
            format!("invalid credential value for header '{name}'"),
            err,
        )
    })?;
    value.set_sensitive(true);
    headers.insert(name, value);
    Ok(())
}

fn bearer_authorization(token: &str) -> String {
    let token = token.trim();
    match token.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => token.to_owned(),
        _ => format!("Bearer {token}"),
    }
}

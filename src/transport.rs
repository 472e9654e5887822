//! Network-call seam of the pipeline.
//!
//! [`HttpRequest`] and [`HttpResponse`] are plain data so interceptors and test
//! transports can build and inspect them without touching the network. The
//! default [`ReqwestTransport`] buffers the whole response body.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart, Method, StatusCode,
};
use tokio_util::sync::CancellationToken;

use crate::{Result, SplashError};

/// Outgoing request for one attempt.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Payload>,
    /// Cancelled when the attempt times out or the caller cancels.
    pub signal: CancellationToken,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            signal: CancellationToken::new(),
            attempt: 1,
        }
    }

    /// Returns a header as a string if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Serialized request body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    /// Multipart form; the transport chooses the boundary and content type.
    Multipart(FormData),
}

/// Multipart form data that can be rebuilt for every attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        bytes: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    /// Appends a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                bytes: bytes.into(),
                file_name,
                mime,
            },
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    fn to_reqwest(&self) -> Result<multipart::Form> {
        let mut form = multipart::Form::new();
        for part in &self.parts {
            form = match &part.value {
                FormValue::Text(value) => form.text(part.name.clone(), value.clone()),
                FormValue::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let mut file = multipart::Part::bytes(bytes.to_vec());
                    if let Some(file_name) = file_name {
                        file = file.file_name(file_name.clone());
                    }
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|err| {
                            SplashError::api_with_source(
                                "invalid_body",
                                format!("invalid mime type '{mime}' for part '{}'", part.name),
                                err,
                            )
                        })?;
                    }
                    form.part(part.name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// Response with a fully buffered body.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL of the response.
    pub url: String,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: String::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and `content-type: application/json`.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .with_body(value.to_string())
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns a header as a string if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Executes one HTTP exchange.
///
/// Implementations should stop work once `request.signal` is cancelled; the
/// pipeline also drops the returned future on timeout or cancellation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured reqwest client (proxies, TLS roots, user agent).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        match &request.body {
            Some(Payload::Bytes(bytes)) => builder = builder.body(bytes.clone()),
            Some(Payload::Multipart(form)) => builder = builder.multipart(form.to_reqwest()?),
            None => {}
        }

        let exchange = async {
            let response = builder.send().await.map_err(SplashError::transport)?;
            let status = response.status();
            let headers = response.headers().clone();
            let url = response.url().to_string();
            let body = response.bytes().await.map_err(SplashError::transport)?;
            Ok(HttpResponse {
                status,
                headers,
                url,
                body,
            })
        };

        tokio::select! {
            biased;
            _ = request.signal.cancelled() => Err(SplashError::aborted()),
            result = exchange => result,
        }
    }
}

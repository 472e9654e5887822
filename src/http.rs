use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ErrorBody, HttpError},
    interceptor::{RequestInterceptor, ResponseInterceptor},
    options::{Body, ClientOptions, RequestOptions, ResponseType},
    query::{self, Query},
    retry::{Retry, RetryPolicy},
    transport::{HttpRequest, HttpResponse, Payload, Transport},
    Result, SplashError,
};

/// Decoded result of a successful call.
#[derive(Clone, Debug)]
pub enum ResponseBody {
    /// Parsed JSON; `None` for `204 No Content`.
    Json(Option<serde_json::Value>),
    Text(String),
    Blob(Bytes),
    Raw(HttpResponse),
}

impl ResponseBody {
    /// Deserializes the body into `T`. An absent body deserializes from `null`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => {
                serde_json::from_value(value.unwrap_or_default()).map_err(SplashError::decode)
            }
            Self::Text(text) => serde_json::from_str(&text).map_err(SplashError::decode),
            Self::Blob(bytes) => serde_json::from_slice(&bytes).map_err(SplashError::decode),
            Self::Raw(response) if response.body.is_empty() => {
                serde_json::from_value(serde_json::Value::Null).map_err(SplashError::decode)
            }
            Self::Raw(response) => {
                serde_json::from_slice(&response.body).map_err(SplashError::decode)
            }
        }
    }
}

pub(crate) struct HttpClientConfig {
    pub base_url: String,
    pub headers: HeaderMap,
    pub options: ClientOptions,
    pub request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    pub transport: Arc<dyn Transport>,
}

/// The request pipeline shared by every resource module.
///
/// Cheap to clone; clones share headers and interceptor lists.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    headers: RwLock<HeaderMap>,
    timeout_ms: u64,
    retry: Retry,
    request_interceptors: RwLock<Vec<Arc<dyn RequestInterceptor>>>,
    response_interceptors: RwLock<Vec<Arc<dyn ResponseInterceptor>>>,
    transport: Arc<dyn Transport>,
}

/// Everything computed once per logical call.
struct Prepared {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Payload>,
    response_type: ResponseType,
    timeout_ms: u64,
    retry: Option<RetryPolicy>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = self.inner.headers.read();
        let redacted: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| {
                let shown = if value.is_sensitive() || name == AUTHORIZATION {
                    "<redacted>"
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                (name.as_str(), shown)
            })
            .collect();
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url)
            .field("headers", &redacted)
            .field("timeout_ms", &self.inner.timeout_ms)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub(crate) fn new(config: HttpClientConfig) -> Self {
        let base_url = config
            .base_url
            .strip_suffix('/')
            .unwrap_or(&config.base_url)
            .to_owned();
        Self {
            inner: Arc::new(Inner {
                base_url,
                headers: RwLock::new(config.headers),
                timeout_ms: config.options.timeout_ms,
                retry: config.options.retry,
                request_interceptors: RwLock::new(config.request_interceptors),
                response_interceptors: RwLock::new(config.response_interceptors),
                transport: config.transport,
            }),
        }
    }

    /// Base URL without its trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Current value of a default header.
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .headers
            .read()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    /// Sets (`Some`) or removes (`None`) a default header for later calls.
    pub fn set_header(&self, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                let (name, value) = parse_header(name, value)?;
                self.inner.headers.write().insert(name, value);
            }
            None => {
                let name = parse_header_name(name)?;
                self.inner.headers.write().remove(name);
            }
        }
        Ok(())
    }

    /// Appends a request interceptor; it runs after those already registered.
    pub fn add_request_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.inner.request_interceptors.write().push(interceptor);
    }

    /// Appends a response interceptor.
    pub fn add_response_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.inner.response_interceptors.write().push(interceptor);
    }

    /// Runs a call in JSON mode and deserializes the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(&self, options: RequestOptions) -> Result<T> {
        let options = options.response_type(ResponseType::Json);
        self.request(options).await?.into_json()
    }

    /// Runs one logical call, retrying failed attempts per the effective policy.
    pub async fn request(&self, options: RequestOptions) -> Result<ResponseBody> {
        let prepared = self.prepare(options)?;
        let mut attempt = 1u32;

        loop {
            let error = match self.attempt(&prepared, attempt).await {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let Some(policy) = prepared
                .retry
                .as_ref()
                .filter(|policy| policy.should_retry(&error, attempt))
            else {
                return Err(error);
            };

            let delay = policy.backoff(attempt);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying request"
            );
            wait_before_retry(delay, prepared.cancel.as_ref()).await?;
            attempt += 1;
        }
    }

    fn prepare(&self, options: RequestOptions) -> Result<Prepared> {
        let url = self.build_url(&options.path, &options.query);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in self.inner.headers.read().iter() {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &options.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let body = options
            .body
            .filter(|body| !matches!(body, Body::Json(serde_json::Value::Null)))
            .map(|body| serialize_body(body, &mut headers))
            .transpose()?;

        let retry = options
            .retry
            .as_ref()
            .unwrap_or(&self.inner.retry)
            .resolve();

        Ok(Prepared {
            method: options.method,
            url,
            headers,
            body,
            response_type: options.response_type,
            timeout_ms: options.timeout_ms.unwrap_or(self.inner.timeout_ms),
            retry,
            cancel: options.cancel,
        })
    }

    fn build_url(&self, path: &str, params: &Query) -> String {
        let full = if path.starts_with("http") {
            path.to_owned()
        } else if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        };
        query::merge_into_url(&full, params)
    }

    async fn attempt(&self, prepared: &Prepared, attempt: u32) -> Result<ResponseBody> {
        if prepared
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(SplashError::aborted());
        }

        let signal = prepared
            .cancel
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let request = HttpRequest {
            method: prepared.method.clone(),
            url: prepared.url.clone(),
            headers: prepared.headers.clone(),
            body: prepared.body.clone(),
            signal: signal.clone(),
            attempt,
        };

        let caller_cancelled = async {
            match &prepared.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = sleep(Duration::from_millis(prepared.timeout_ms));

        let outcome = tokio::select! {
            biased;
            result = self.exchange(request) => result,
            _ = caller_cancelled => Err(SplashError::aborted()),
            _ = deadline => {
                signal.cancel();
                Err(SplashError::Timeout {
                    timeout_ms: prepared.timeout_ms,
                })
            }
        };

        decode(outcome?, prepared.response_type)
    }

    /// Interceptors, dispatch and status classification for one attempt.
    async fn exchange(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let request_interceptors = self.inner.request_interceptors.read().clone();
        for interceptor in &request_interceptors {
            request = interceptor
                .intercept(request)
                .await
                .map_err(SplashError::interceptor)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = request.attempt,
            "dispatching request"
        );
        let mut response = self.inner.transport.send(&request).await?;

        let response_interceptors = self.inner.response_interceptors.read().clone();
        for interceptor in &response_interceptors {
            response = interceptor
                .intercept(response, &request)
                .await
                .map_err(SplashError::interceptor)?;
        }

        check_status(response, &request)
    }
}

/// Validates a header pair; `authorization` values are marked sensitive.
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = parse_header_name(name)?;
    let mut value = parse_header_value(&name, value)?;
    if name == AUTHORIZATION {
        value.set_sensitive(true);
    }
    Ok((name, value))
}

fn parse_header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
        SplashError::api_with_source("invalid_header", format!("invalid header name '{name}'"), err)
    })
}

fn parse_header_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| {
        SplashError::api_with_source(
            "invalid_header",
            format!("invalid value for header '{name}'"),
            err,
        )
    })
}

fn serialize_body(body: Body, headers: &mut HeaderMap) -> Result<Payload> {
    let value = match body {
        Body::Multipart(form) => {
            headers.remove(CONTENT_TYPE);
            return Ok(Payload::Multipart(form));
        }
        Body::Raw(bytes) => return Ok(Payload::Bytes(bytes)),
        Body::Json(value) => value,
    };

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    match content_type.as_deref() {
        Some(ct) if ct.contains("application/x-www-form-urlencoded") => {
            serde_urlencoded::to_string(&value)
                .map(|form| Payload::Bytes(form.into()))
                .map_err(|err| {
                    SplashError::api_with_source(
                        "invalid_body",
                        "body cannot be encoded as a URL-encoded form",
                        err,
                    )
                })
        }
        Some(ct) if !ct.contains("application/json") => match value {
            serde_json::Value::String(text) => Ok(Payload::Bytes(text.into())),
            other => Ok(Payload::Bytes(other.to_string().into())),
        },
        _ => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(Payload::Bytes(value.to_string().into()))
        }
    }
}

fn check_status(response: HttpResponse, request: &HttpRequest) -> Result<HttpResponse> {
    let status = response.status;
    if (200..400).contains(&status.as_u16()) {
        return Ok(response);
    }

    let body = ErrorBody::parse(&response.body);
    let message = match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    };
    let error = HttpError {
        message,
        status: status.as_u16(),
        url: request.url.clone(),
        method: request.method.clone(),
        body,
        response,
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = error
            .response
            .headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, SystemTime::now()));
        #[cfg(feature = "tracing")]
        tracing::warn!(
            url = %error.url,
            retry_after_ms = retry_after.map(|delay| delay.as_millis() as u64),
            "rate limited"
        );
        return Err(SplashError::RateLimit {
            error: HttpError {
                message: "Rate limited".to_owned(),
                ..error
            },
            retry_after,
        });
    }

    Err(SplashError::Http(error))
}

/// Converts a `retry-after` header (delta-seconds or HTTP-date) into a delay
/// relative to `now`, clamped at zero.
pub(crate) fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        return Duration::try_from_secs_f64(seconds.max(0.0)).ok();
    }
    httpdate::parse_http_date(value)
        .ok()
        .map(|date| date.duration_since(now).unwrap_or(Duration::ZERO))
}

fn decode(response: HttpResponse, response_type: ResponseType) -> Result<ResponseBody> {
    match response_type {
        ResponseType::Raw => Ok(ResponseBody::Raw(response)),
        ResponseType::Blob => Ok(ResponseBody::Blob(response.body)),
        ResponseType::Text => String::from_utf8(response.body.to_vec())
            .map(ResponseBody::Text)
            .map_err(SplashError::decode),
        ResponseType::Json if response.status == StatusCode::NO_CONTENT => {
            Ok(ResponseBody::Json(None))
        }
        ResponseType::Json => serde_json::from_slice(&response.body)
            .map(|value| ResponseBody::Json(Some(value)))
            .map_err(SplashError::decode),
    }
}

async fn wait_before_retry(delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(SplashError::aborted()),
            _ = sleep(delay) => Ok(()),
        },
        None => {
            sleep(delay).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::Arc,
        time::{Duration, SystemTime},
    };

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::{
        header::{HeaderMap, HeaderValue, RETRY_AFTER},
        Method, StatusCode,
    };
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::{parse_retry_after, HttpClient, HttpClientConfig, ResponseBody};
    use crate::{
        error::ErrorBody,
        interceptor::{RequestInterceptor, ResponseInterceptor},
        options::{Body, ClientOptions, RequestOptions, ResponseType},
        query::Query,
        retry::{Retry, RetryPolicy},
        transport::{FormData, HttpRequest, HttpResponse, Payload, Transport},
        Result, SplashError,
    };

    enum Step {
        Respond(HttpResponse),
        Delayed(Duration, HttpResponse),
    }

    #[derive(Default)]
    struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn hits(&self) -> usize {
            self.seen.lock().len()
        }

        fn seen(&self, index: usize) -> HttpRequest {
            self.seen.lock()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.seen.lock().push(request.clone());
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Respond(response)) => Ok(response),
                Some(Step::Delayed(delay, response)) => {
                    tokio::time::sleep(delay).await;
                    Ok(response)
                }
                None => Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_body("no scripted response")),
            }
        }
    }

    fn ok(body: serde_json::Value) -> Step {
        Step::Respond(HttpResponse::new(StatusCode::OK).with_json(&body))
    }

    fn status(code: u16) -> Step {
        Step::Respond(HttpResponse::new(
            StatusCode::from_u16(code).expect("valid status"),
        ))
    }

    fn client_with(transport: &Arc<ScriptedTransport>, options: ClientOptions) -> HttpClient {
        HttpClient::new(HttpClientConfig {
            base_url: "https://api.example.com/".to_owned(),
            headers: HeaderMap::new(),
            options,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            transport: transport.clone(),
        })
    }

    fn client(transport: &Arc<ScriptedTransport>) -> HttpClient {
        client_with(transport, ClientOptions::default())
    }

    fn retrying(transport: &Arc<ScriptedTransport>) -> HttpClient {
        client_with(
            transport,
            ClientOptions {
                retry: Retry::Enabled,
                ..ClientOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn builds_url_and_layers_headers() {
        let transport = ScriptedTransport::new(vec![ok(json!([]))]);
        let http = client(&transport);
        http.set_header("accept-version", Some("v1"))
            .expect("valid header");
        http.set_header("x-client", Some("splash")).expect("valid header");

        http.request(
            RequestOptions::new("photos")
                .query(Query::new().with("page", 2).with("color", None::<&str>))
                .header("Accept-Version", "v2"),
        )
        .await
        .expect("request must succeed");

        let seen = transport.seen(0);
        assert_eq!(seen.url, "https://api.example.com/photos?page=2");
        assert_eq!(seen.method, Method::GET);
        assert_eq!(seen.header("content-type"), Some("application/json"));
        assert_eq!(seen.header("accept-version"), Some("v2"));
        assert_eq!(seen.header("x-client"), Some("splash"));
        assert!(seen.body.is_none());
    }

    #[tokio::test]
    async fn absolute_path_is_used_verbatim() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        client(&transport)
            .request(RequestOptions::new("https://other.example.com/x?a=1#f").query(Query::new().with("a", 2)))
            .await
            .expect("request must succeed");

        assert_eq!(transport.seen(0).url, "https://other.example.com/x?a=2#f");
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retry_with_backoff_then_surface() {
        let transport = ScriptedTransport::new(vec![status(500), status(500), status(500)]);
        let http = retrying(&transport);
        let started = tokio::time::Instant::now();

        let err = http
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("must exhaust retries");

        assert!(matches!(err, SplashError::Http(_)));
        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.hits(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_000), "elapsed {elapsed:?}");
        assert_eq!(transport.seen(0).attempt, 1);
        assert_eq!(transport.seen(2).attempt, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let transport = ScriptedTransport::new(vec![status(503), ok(json!({"id": "abc"}))]);
        let value: serde_json::Value = retrying(&transport)
            .request_json(RequestOptions::new("/photos/abc"))
            .await
            .expect("second attempt must succeed");

        assert_eq!(value, json!({"id": "abc"}));
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Respond(
            HttpResponse::new(StatusCode::NOT_FOUND).with_json(&json!({"errors": ["Couldn't find Photo"]})),
        )]);
        let err = retrying(&transport)
            .request(RequestOptions::new("/photos/missing"))
            .await
            .expect_err("404 must fail");

        assert_eq!(transport.hits(), 1);
        let http = err.as_http().expect("http error");
        assert_eq!(http.status, 404);
        assert_eq!(http.method, Method::GET);
        assert_eq!(http.url, "https://api.example.com/photos/missing");
        assert_eq!(http.message, "HTTP 404 Not Found");
        assert_eq!(
            http.body,
            ErrorBody::Json(json!({"errors": ["Couldn't find Photo"]}))
        );
    }

    #[tokio::test]
    async fn failure_body_falls_back_to_text() {
        let transport = ScriptedTransport::new(vec![Step::Respond(
            HttpResponse::new(StatusCode::BAD_GATEWAY).with_body("upstream down"),
        )]);
        let err = client(&transport)
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("502 must fail");

        assert_eq!(
            err.as_http().map(|http| &http.body),
            Some(&ErrorBody::Text("upstream down".to_owned()))
        );
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let transport = ScriptedTransport::new(vec![Step::Respond(
            HttpResponse::new(StatusCode::TOO_MANY_REQUESTS)
                .with_header(RETRY_AFTER, HeaderValue::from_static("5"))
                .with_body("Rate Limit Exceeded"),
        )]);
        let err = client(&transport)
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("429 must fail");

        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(5_000)));
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.code(), Some("rate_limited"));
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_when_enabled() {
        let transport = ScriptedTransport::new(vec![status(429), ok(json!([1, 2]))]);
        let body = retrying(&transport)
            .request(RequestOptions::new("/photos"))
            .await
            .expect("retry must succeed");

        assert!(matches!(body, ResponseBody::Json(Some(_))));
        assert_eq!(transport.hits(), 2);
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let in_ten = httpdate::fmt_http_date(now + Duration::from_secs(10));
        let past = httpdate::fmt_http_date(now - Duration::from_secs(10));

        assert_eq!(parse_retry_after("5", now), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 1.5 ", now), Some(Duration::from_millis(1_500)));
        assert_eq!(parse_retry_after("-3", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after(&in_ten, now), Some(Duration::from_secs(10)));
        assert_eq!(parse_retry_after(&past, now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("", now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_becomes_timeout_error() {
        let transport = ScriptedTransport::new(vec![Step::Delayed(
            Duration::from_millis(100),
            HttpResponse::new(StatusCode::OK),
        )]);
        let err = client(&transport)
            .request(RequestOptions::new("/photos").timeout_ms(20))
            .await
            .expect_err("must time out");

        assert!(err.is_timeout());
        assert_eq!(err.code(), Some("timeout"));
        assert!(transport.seen(0).signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_with_a_fresh_window() {
        let transport = ScriptedTransport::new(vec![
            Step::Delayed(Duration::from_millis(100), HttpResponse::new(StatusCode::OK)),
            ok(json!({"ok": true})),
        ]);
        let body = client(&transport)
            .request(
                RequestOptions::new("/photos")
                    .timeout_ms(20)
                    .retry(true),
            )
            .await
            .expect("second attempt must succeed");

        assert!(matches!(body, ResponseBody::Json(Some(_))));
        assert_eq!(transport.hits(), 2);
        assert!(!transport.seen(1).signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_aborts_without_retry() {
        let transport = ScriptedTransport::new(vec![Step::Delayed(
            Duration::from_secs(5),
            HttpResponse::new(StatusCode::OK),
        )]);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = retrying(&transport)
            .request(RequestOptions::new("/photos").cancel_token(token))
            .await
            .expect_err("must abort");

        assert_eq!(err.code(), Some("aborted"));
        assert!(!err.is_timeout());
        assert_eq!(transport.hits(), 1);
        assert!(transport.seen(0).signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_stops_call_before_dispatch() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let token = CancellationToken::new();
        token.cancel();

        let err = retrying(&transport)
            .request(RequestOptions::new("/photos").cancel_token(token))
            .await
            .expect_err("must abort");

        assert_eq!(err.code(), Some("aborted"));
        assert_eq!(transport.hits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_interrupts_backoff() {
        let transport = ScriptedTransport::new(vec![status(500), ok(json!({}))]);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = client(&transport)
            .request(
                RequestOptions::new("/photos")
                    .cancel_token(token)
                    .retry(RetryPolicy::new(1).with_backoff(10_000, 10_000)),
            )
            .await
            .expect_err("must abort during backoff");

        assert_eq!(err.code(), Some("aborted"));
        assert_eq!(transport.hits(), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn per_call_retry_false_disables_client_retry() {
        let transport = ScriptedTransport::new(vec![status(500), ok(json!({}))]);
        let err = retrying(&transport)
            .request(RequestOptions::new("/photos").retry(false))
            .await
            .expect_err("must not retry");

        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test]
    async fn interceptors_run_in_registration_order() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        let http = client(&transport);
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            let order = order.clone();
            http.add_request_interceptor(Arc::new(
                move |mut request: HttpRequest| -> Result<HttpRequest> {
                    order.lock().push(label);
                    request
                        .headers
                        .insert("x-last", HeaderValue::from_static(label));
                    Ok(request)
                },
            ));
        }
        // rewrite the failure into a success to show replacement
        http.add_response_interceptor(Arc::new(
            |_response: HttpResponse, request: &HttpRequest| -> Result<HttpResponse> {
                let seen = request.header("x-last").unwrap_or_default().to_owned();
                Ok(HttpResponse::new(StatusCode::OK).with_json(&json!({ "seen": seen })))
            },
        ));

        let value: serde_json::Value = http
            .request_json(RequestOptions::new("/photos"))
            .await
            .expect("interceptor must rewrite response");

        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(value, json!({"seen": "second"}));
        assert_eq!(transport.seen(0).header("x-last"), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_response_interceptor_is_not_retried() {
        let transport = ScriptedTransport::new(vec![ok(json!({})), ok(json!({}))]);
        let http = retrying(&transport);
        let failing: Arc<dyn ResponseInterceptor> = Arc::new(
            |_response: HttpResponse, _request: &HttpRequest| -> Result<HttpResponse> {
                Err(SplashError::Timeout { timeout_ms: 1 })
            },
        );
        http.add_response_interceptor(failing);

        let err = http
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("interceptor must fail");

        assert_eq!(err.code(), Some("interceptor"));
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test]
    async fn request_interceptor_errors_skip_dispatch() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let http = client(&transport);
        let reject: Arc<dyn RequestInterceptor> =
            Arc::new(|_request: HttpRequest| -> Result<HttpRequest> {
                Err(SplashError::invalid_argument("blocked"))
            });
        http.add_request_interceptor(reject);

        let err = http
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("must be rejected");

        assert_eq!(err.code(), Some("invalid_argument"));
        assert_eq!(transport.hits(), 0);
    }

    #[tokio::test]
    async fn decode_modes() {
        let transport = ScriptedTransport::new(vec![
            status(204),
            Step::Respond(HttpResponse::new(StatusCode::OK).with_body("plain")),
            Step::Respond(HttpResponse::new(StatusCode::OK).with_body(vec![0u8, 159, 146])),
            Step::Respond(HttpResponse::new(StatusCode::CREATED).with_body("{}")),
        ]);
        let http = client(&transport);

        let empty = http
            .request(RequestOptions::new("/a"))
            .await
            .expect("204 must succeed");
        assert!(matches!(empty, ResponseBody::Json(None)));

        let text = http
            .request(RequestOptions::new("/b").response_type(ResponseType::Text))
            .await
            .expect("text must decode");
        assert!(matches!(text, ResponseBody::Text(ref value) if value == "plain"));

        let blob = http
            .request(RequestOptions::new("/c").response_type(ResponseType::Blob))
            .await
            .expect("blob must decode");
        assert!(matches!(blob, ResponseBody::Blob(ref bytes) if bytes[..] == [0u8, 159, 146]));

        let raw = http
            .request(RequestOptions::new("/d").response_type(ResponseType::Raw))
            .await
            .expect("raw must pass through");
        assert!(matches!(raw, ResponseBody::Raw(ref response) if response.status == StatusCode::CREATED));
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let transport = ScriptedTransport::new(vec![Step::Respond(
            HttpResponse::new(StatusCode::OK).with_body("<html>"),
        )]);
        let err = client(&transport)
            .request(RequestOptions::new("/photos"))
            .await
            .expect_err("must fail to decode");

        assert_eq!(err.code(), Some("decode"));
    }

    #[tokio::test]
    async fn json_bodies_follow_content_type() {
        let transport = ScriptedTransport::new(vec![ok(json!({})), ok(json!({})), ok(json!({}))]);
        let http = client(&transport);

        http.request(
            RequestOptions::new("/json")
                .method(Method::POST)
                .body(json!({"name": "Stone house"})),
        )
        .await
        .expect("json body");
        http.request(
            RequestOptions::new("/form")
                .method(Method::POST)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(json!({"q": "a b", "n": 1})),
        )
        .await
        .expect("form body");
        http.request(
            RequestOptions::new("/text")
                .method(Method::POST)
                .header("content-type", "text/plain")
                .body(json!("hello")),
        )
        .await
        .expect("text body");

        let body = |index: usize| match transport.seen(index).body {
            Some(Payload::Bytes(bytes)) => String::from_utf8(bytes.to_vec()).expect("utf8"),
            other => panic!("unexpected body {other:?}"),
        };
        assert_eq!(body(0), r#"{"name":"Stone house"}"#);
        assert_eq!(body(1), "n=1&q=a+b");
        assert_eq!(body(2), "hello");
        assert_eq!(transport.seen(2).header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn null_json_body_sends_nothing() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        client(&transport)
            .request(
                RequestOptions::new("/photos/abc/like")
                    .method(Method::POST)
                    .body(serde_json::Value::Null),
            )
            .await
            .expect("request must succeed");

        assert!(transport.seen(0).body.is_none());
    }

    #[tokio::test]
    async fn multipart_drops_content_type() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        client(&transport)
            .request(
                RequestOptions::new("/upload")
                    .method(Method::POST)
                    .body(Body::Multipart(FormData::new().text("title", "x"))),
            )
            .await
            .expect("multipart body");

        let seen = transport.seen(0);
        assert!(seen.header("content-type").is_none());
        assert!(matches!(seen.body, Some(Payload::Multipart(_))));
    }

    #[tokio::test]
    async fn invalid_header_fails_before_dispatch() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let err = client(&transport)
            .request(RequestOptions::new("/photos").header("bad header", "x"))
            .await
            .expect_err("must reject header");

        assert_eq!(err.code(), Some("invalid_header"));
        assert_eq!(transport.hits(), 0);
    }

    #[test]
    fn set_header_adds_and_removes() {
        let transport = ScriptedTransport::new(Vec::new());
        let http = client(&transport);
        http.set_header("x-client", Some("one")).expect("valid");
        assert_eq!(http.header("x-client").as_deref(), Some("one"));
        http.set_header("x-client", None).expect("valid");
        assert!(http.header("x-client").is_none());
        assert_eq!(http.base_url(), "https://api.example.com");
    }

    #[test]
    fn debug_redacts_authorization_value() {
        let transport = ScriptedTransport::new(Vec::new());
        let http = client(&transport);
        http.set_header("authorization", Some("Client-ID secret-token"))
            .expect("valid");
        let debug = format!("{http:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}

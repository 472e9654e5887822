use std::{fmt, sync::Arc};

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    auth::{ApiKeyAuth, AuthStrategy},
    http::{self, HttpClient, HttpClientConfig, ResponseBody},
    interceptor::{RequestInterceptor, ResponseInterceptor},
    options::{ClientOptions, RequestOptions},
    resources::{Collections, Photos, Search, Topics},
    transport::{ReqwestTransport, Transport},
    Result, SplashError,
};

/// Production API root used when `SPLASH_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";

const ACCESS_KEY_ENV: &str = "SPLASH_ACCESS_KEY";
const BASE_URL_ENV: &str = "SPLASH_BASE_URL";

/// Async client for the photo API.
///
/// Cheap to clone; clones share default headers and interceptors.
#[derive(Clone, Debug)]
pub struct SplashClient {
    http: HttpClient,
}

impl SplashClient {
    /// Creates a client with default options and no credentials.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> SplashClientBuilder {
        SplashClientBuilder::new(base_url.into())
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `SPLASH_ACCESS_KEY`: access key, sent as `Authorization: Client-ID <key>`
    /// - `SPLASH_BASE_URL`: optional API root, defaults to [`DEFAULT_BASE_URL`]
    ///
    /// # Example
    ///
    /// ```no_run
    /// use splash_http::SplashClient;
    ///
    /// let client = SplashClient::from_env().expect("missing SPLASH_ACCESS_KEY");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::builder_from_env()?.build()
    }

    /// Like [`SplashClient::from_env`] but returns the builder for further
    /// configuration.
    pub fn builder_from_env() -> Result<SplashClientBuilder> {
        env_builder(
            std::env::var(ACCESS_KEY_ENV).ok(),
            std::env::var(BASE_URL_ENV).ok(),
        )
    }

    /// Sets (`Some`) or removes (`None`) a default header for later calls.
    pub fn set_header(&self, name: &str, value: Option<&str>) -> Result<()> {
        self.http.set_header(name, value)
    }

    pub fn add_request_interceptor(&self, interceptor: impl RequestInterceptor + 'static) {
        self.http.add_request_interceptor(Arc::new(interceptor));
    }

    pub fn add_response_interceptor(&self, interceptor: impl ResponseInterceptor + 'static) {
        self.http.add_response_interceptor(Arc::new(interceptor));
    }

    /// The underlying request pipeline.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub async fn request(&self, options: RequestOptions) -> Result<ResponseBody> {
        self.http.request(options).await
    }

    pub async fn request_json<T: DeserializeOwned>(&self, options: RequestOptions) -> Result<T> {
        self.http.request_json(options).await
    }

    pub fn photos(&self) -> Photos<'_> {
        Photos::new(&self.http)
    }

    pub fn search(&self) -> Search<'_> {
        Search::new(&self.http)
    }

    pub fn collections(&self) -> Collections<'_> {
        Collections::new(&self.http)
    }

    pub fn topics(&self) -> Topics<'_> {
        Topics::new(&self.http)
    }
}

/// Configures a [`SplashClient`].
///
/// Auth strategies run after every request interceptor added here, in the
/// order they were added.
pub struct SplashClientBuilder {
    base_url: String,
    headers: Vec<(String, String)>,
    options: ClientOptions,
    auth: Vec<Arc<dyn AuthStrategy>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for SplashClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("SplashClientBuilder")
            .field("base_url", &self.base_url)
            .field("headers", &header_names)
            .field("options", &self.options)
            .field("auth", &self.auth.len())
            .finish_non_exhaustive()
    }
}

impl SplashClientBuilder {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            headers: Vec::new(),
            options: ClientOptions::default(),
            auth: Vec::new(),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            transport: None,
        }
    }

    /// Adds a default header sent with every call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn auth(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.auth.push(Arc::new(strategy));
        self
    }

    pub fn request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn response_interceptor(
        mut self,
        interceptor: impl ResponseInterceptor + 'static,
    ) -> Self {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Replaces the default reqwest-backed transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<SplashClient> {
        let base_url = self.base_url.trim().to_owned();
        let parsed = Url::parse(&base_url).map_err(|err| {
            SplashError::api_with_source("config", format!("invalid base URL '{base_url}'"), err)
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SplashError::config(format!(
                "base URL '{base_url}' must use http or https"
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (name, value) = http::parse_header(name, value)?;
            headers.insert(name, value);
        }

        let mut request_interceptors = self.request_interceptors;
        request_interceptors.extend(self.auth.iter().map(|strategy| strategy.as_request_interceptor()));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            base_url = %base_url,
            timeout_ms = self.options.timeout_ms,
            "building splash client"
        );

        Ok(SplashClient {
            http: HttpClient::new(HttpClientConfig {
                base_url,
                headers,
                options: self.options,
                request_interceptors,
                response_interceptors: self.response_interceptors,
                transport,
            }),
        })
    }
}

fn env_builder(access_key: Option<String>, base_url: Option<String>) -> Result<SplashClientBuilder> {
    let access_key = access_key
        .ok_or_else(|| SplashError::config(format!("missing {ACCESS_KEY_ENV} environment variable")))?;
    if access_key.trim().is_empty() {
        return Err(SplashError::config(format!(
            "{ACCESS_KEY_ENV} is set but empty"
        )));
    }
    let base_url = base_url
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

    Ok(SplashClient::builder(base_url).auth(ApiKeyAuth::new(
        "Authorization",
        format!("Client-ID {}", access_key.trim()),
    )))
}

#[cfg(test)]
mod tests {
    use super::{env_builder, SplashClient, DEFAULT_BASE_URL};
    use crate::options::ClientOptions;

    #[test]
    fn build_rejects_invalid_base_url() {
        let err = SplashClient::new("not a url").expect_err("must reject");
        assert_eq!(err.code(), Some("config"));

        let err = SplashClient::new("ftp://files.example.com").expect_err("must reject scheme");
        assert_eq!(err.code(), Some("config"));
    }

    #[test]
    fn build_rejects_invalid_default_header() {
        let err = SplashClient::builder("https://api.example.com")
            .header("accept version", "v1")
            .build()
            .expect_err("must reject header");
        assert_eq!(err.code(), Some("invalid_header"));
    }

    #[test]
    fn base_url_loses_one_trailing_slash() {
        let client = SplashClient::new("https://api.example.com/").expect("valid");
        assert_eq!(client.http().base_url(), "https://api.example.com");
    }

    #[test]
    fn default_headers_are_mutable() {
        let client = SplashClient::builder("https://api.example.com")
            .header("Accept-Version", "v1")
            .options(ClientOptions::default().with_retry(true))
            .build()
            .expect("valid");
        assert_eq!(client.http().header("accept-version").as_deref(), Some("v1"));

        client.set_header("Accept-Version", Some("v2")).expect("valid");
        assert_eq!(client.http().header("accept-version").as_deref(), Some("v2"));
        client.set_header("Accept-Version", None).expect("valid");
        assert!(client.http().header("accept-version").is_none());
    }

    #[test]
    fn env_builder_requires_access_key() {
        let err = env_builder(None, None).expect_err("missing key");
        assert_eq!(err.code(), Some("config"));
        let err = env_builder(Some("  ".to_owned()), None).expect_err("blank key");
        assert_eq!(err.code(), Some("config"));
    }

    #[test]
    fn env_builder_defaults_base_url() {
        let client = env_builder(Some("key".to_owned()), Some(String::new()))
            .expect("valid env")
            .build()
            .expect("valid client");
        assert_eq!(client.http().base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn debug_redacts_authorization_value() {
        let client = SplashClient::builder("https://api.example.com")
            .header("Authorization", "Client-ID secret-token")
            .build()
            .expect("valid");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}

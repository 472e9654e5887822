//! `splash-http` is an async client for the Unsplash photo API.
//!
//! Resource groups sit on top of a single request pipeline:
//! - [`SplashClient::photos`]
//! - [`SplashClient::search`]
//! - [`SplashClient::collections`]
//! - [`SplashClient::topics`]
//!
//! The pipeline ([`HttpClient`]) handles URL and query building, interceptors,
//! auth strategies, per-attempt timeouts, cancellation and retry with
//! exponential backoff.
//!
//! ```no_run
//! use splash_http::{ApiKeyAuth, ClientOptions, SearchPhotosParams, SplashClient};
//!
//! # async fn run() -> splash_http::Result<()> {
//! let client = SplashClient::builder("https://api.unsplash.com")
//!     .auth(ApiKeyAuth::new("Authorization", "Client-ID <access key>"))
//!     .options(ClientOptions::default().with_retry(true))
//!     .build()?;
//!
//! let results: serde_json::Value = client
//!     .search()
//!     .photos(&SearchPhotosParams::new("lighthouse"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod http;
mod interceptor;
mod options;
mod retry;
mod transport;

pub mod query;
pub mod resources;

pub use auth::{ApiKeyAuth, AuthStrategy, BearerTokenAuth};
pub use client::{SplashClient, SplashClientBuilder, DEFAULT_BASE_URL};
pub use error::{ErrorBody, HttpError, SplashError};
pub use http::{HttpClient, ResponseBody};
#[cfg(feature = "tracing")]
pub use interceptor::LoggingInterceptor;
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use options::{Body, ClientOptions, RequestOptions, ResponseType, DEFAULT_TIMEOUT_MS};
pub use query::{Query, QueryValue};
pub use resources::{
    Collections, Color, ContentFilter, OrderBy, Orientation, PageParams, Photos, Search,
    SearchParams, SearchPhotosParams, Topics,
};
pub use retry::{default_retry_on, Retry, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
pub use transport::{
    FormData, FormPart, FormValue, HttpRequest, HttpResponse, Payload, ReqwestTransport, Transport,
};

pub type Result<T> = std::result::Result<T, SplashError>;

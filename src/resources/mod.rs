//! Resource-oriented method groups.
//!
//! Each group borrows the client's pipeline and prefixes its own base path.
//! Methods only add parameters that are set and non-empty.

mod collections;
mod photos;
mod search;
mod topics;

pub use collections::Collections;
pub use photos::Photos;
pub use search::{Color, ContentFilter, OrderBy, Orientation, Search, SearchParams, SearchPhotosParams};
pub use topics::Topics;

use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::{http::HttpClient, options::RequestOptions, query::Query, Result, SplashError};

/// Page selection shared by list endpoints. Zero means "server default".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub(crate) fn apply(&self, query: &mut Query) {
        put_number(query, "page", self.page);
        put_number(query, "per_page", self.per_page);
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Resource<'a> {
    http: &'a HttpClient,
    base_path: &'a str,
}

impl<'a> Resource<'a> {
    pub(crate) fn new(http: &'a HttpClient, base_path: &'a str) -> Self {
        Self {
            http,
            base_path: base_path.strip_suffix('/').unwrap_or(base_path),
        }
    }

    pub(crate) fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.base_path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, suffix: &str, query: Query) -> Result<T> {
        let options = RequestOptions::new(self.path(suffix)).query(query);
        self.http.request_json(options).await
    }
}

/// Validates an id and percent-encodes it as a single path segment.
///
/// Blank ids and the dot segments `.`/`..` are rejected.
pub(crate) fn path_segment(kind: &str, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(SplashError::invalid_argument(format!(
            "{kind} must not be empty"
        )));
    }
    if id == "." || id == ".." {
        return Err(SplashError::invalid_argument(format!(
            "{kind} must not be a dot segment"
        )));
    }
    // form encoding turns spaces into '+', which a path would keep literally
    Ok(form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20"))
}

pub(crate) fn put_number(query: &mut Query, key: &str, value: u32) {
    if value > 0 {
        query.insert(key, value);
    }
}

pub(crate) fn put_text(query: &mut Query, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        query.insert(key, value);
    }
}

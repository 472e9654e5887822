use serde::de::DeserializeOwned;

use super::{path_segment, put_number, PageParams, Resource};
use crate::{http::HttpClient, query::Query, Result};

/// `/photos` endpoints.
#[derive(Clone, Copy, Debug)]
pub struct Photos<'a> {
    resource: Resource<'a>,
}

impl<'a> Photos<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self {
            resource: Resource::new(http, "/photos"),
        }
    }

    /// One page of the editorial feed.
    pub async fn list<T: DeserializeOwned>(&self, page: PageParams) -> Result<T> {
        let mut query = Query::new();
        page.apply(&mut query);
        self.resource.get("", query).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("photo id", id)?;
        self.resource.get(&format!("/{id}"), Query::new()).await
    }

    /// A single random photo, or an array of `count` photos when `count > 0`.
    pub async fn random<T: DeserializeOwned>(&self, count: u32) -> Result<T> {
        let mut query = Query::new();
        put_number(&mut query, "count", count);
        self.resource.get("/random", query).await
    }

    pub async fn statistics<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("photo id", id)?;
        self.resource
            .get(&format!("/{id}/statistics"), Query::new())
            .await
    }

    /// Tracks a download and returns the `{ "url": … }` payload.
    pub async fn download<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("photo id", id)?;
        self.resource
            .get(&format!("/{id}/download"), Query::new())
            .await
    }
}

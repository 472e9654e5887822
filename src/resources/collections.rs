use serde::de::DeserializeOwned;

use super::{path_segment, PageParams, Resource};
use crate::{http::HttpClient, query::Query, Result};

/// `/collections` endpoints.
#[derive(Clone, Copy, Debug)]
pub struct Collections<'a> {
    resource: Resource<'a>,
}

impl<'a> Collections<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self {
            resource: Resource::new(http, "/collections"),
        }
    }

    pub async fn list<T: DeserializeOwned>(&self, page: PageParams) -> Result<T> {
        let mut query = Query::new();
        page.apply(&mut query);
        self.resource.get("", query).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("collection id", id)?;
        self.resource.get(&format!("/{id}"), Query::new()).await
    }

    pub async fn photos<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("collection id", id)?;
        self.resource.get(&format!("/{id}/photos"), Query::new()).await
    }

    pub async fn related<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let id = path_segment("collection id", id)?;
        self.resource.get(&format!("/{id}/related"), Query::new()).await
    }
}

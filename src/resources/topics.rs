use serde::de::DeserializeOwned;

use super::{path_segment, Resource};
use crate::{http::HttpClient, query::Query, Result};

/// `/topics` endpoints. Topics are addressed by id or slug.
#[derive(Clone, Copy, Debug)]
pub struct Topics<'a> {
    resource: Resource<'a>,
}

impl<'a> Topics<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self {
            resource: Resource::new(http, "/topics"),
        }
    }

    pub async fn list<T: DeserializeOwned>(&self) -> Result<T> {
        self.resource.get("", Query::new()).await
    }

    pub async fn get<T: DeserializeOwned>(&self, id_or_slug: &str) -> Result<T> {
        let id = path_segment("topic id or slug", id_or_slug)?;
        self.resource.get(&format!("/{id}"), Query::new()).await
    }

    pub async fn photos<T: DeserializeOwned>(&self, id_or_slug: &str) -> Result<T> {
        let id = path_segment("topic id or slug", id_or_slug)?;
        self.resource.get(&format!("/{id}/photos"), Query::new()).await
    }
}

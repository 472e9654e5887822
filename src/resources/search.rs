use serde::de::DeserializeOwned;

use super::{put_number, put_text, Resource};
use crate::{http::HttpClient, query::Query, Result};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 10;

/// Sort order for photo search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderBy {
    Latest,
    #[default]
    Relevant,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Relevant => "relevant",
        }
    }
}

/// Content safety filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentFilter {
    #[default]
    Low,
    High,
}

impl ContentFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    BlackAndWhite,
    Black,
    White,
    Yellow,
    Orange,
    Red,
    Purple,
    Magenta,
    Green,
    Teal,
    Blue,
}

impl Color {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlackAndWhite => "black_and_white",
            Self::Black => "black",
            Self::White => "white",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Purple => "purple",
            Self::Magenta => "magenta",
            Self::Green => "green",
            Self::Teal => "teal",
            Self::Blue => "blue",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Squarish,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Squarish => "squarish",
        }
    }
}

/// Parameters for `GET /search/photos`.
///
/// Unset fields fall back to `page=1`, `per_page=10`, `order_by=relevant` and
/// `content_filter=low`. A page or page size of zero is omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPhotosParams {
    pub query: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_by: Option<OrderBy>,
    /// Comma-separated collection ids.
    pub collections: Option<String>,
    pub content_filter: Option<ContentFilter>,
    pub color: Option<Color>,
    pub orientation: Option<Orientation>,
}

impl SearchPhotosParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn collections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = ids
            .into_iter()
            .map(|id| id.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(",");
        self.collections = Some(joined);
        self
    }

    pub fn content_filter(mut self, filter: ContentFilter) -> Self {
        self.content_filter = Some(filter);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        put_text(&mut query, "query", Some(self.query.as_str()));
        put_number(&mut query, "page", self.page.unwrap_or(DEFAULT_PAGE));
        put_number(&mut query, "per_page", self.per_page.unwrap_or(DEFAULT_PER_PAGE));
        query.insert("order_by", self.order_by.unwrap_or_default().as_str());
        put_text(&mut query, "collections", self.collections.as_deref());
        query.insert(
            "content_filter",
            self.content_filter.unwrap_or_default().as_str(),
        );
        put_text(&mut query, "color", self.color.map(Color::as_str));
        put_text(
            &mut query,
            "orientation",
            self.orientation.map(Orientation::as_str),
        );
        query
    }
}

/// Parameters for collection and user search. Zero page values are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub page: u32,
    pub per_page: u32,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        put_text(&mut query, "query", Some(self.query.as_str()));
        put_number(&mut query, "page", self.page);
        put_number(&mut query, "per_page", self.per_page);
        query
    }
}

/// `/search` endpoints.
#[derive(Clone, Copy, Debug)]
pub struct Search<'a> {
    resource: Resource<'a>,
}

impl<'a> Search<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self {
            resource: Resource::new(http, "/search"),
        }
    }

    pub async fn photos<T: DeserializeOwned>(&self, params: &SearchPhotosParams) -> Result<T> {
        self.resource.get("/photos", params.to_query()).await
    }

    pub async fn collections<T: DeserializeOwned>(&self, params: &SearchParams) -> Result<T> {
        self.resource.get("/collections", params.to_query()).await
    }

    pub async fn users<T: DeserializeOwned>(&self, params: &SearchParams) -> Result<T> {
        self.resource.get("/users", params.to_query()).await
    }
}

//! Query string encoding, merging and parsing.
//!
//! Values follow `application/x-www-form-urlencoded` rules. Arrays repeat the
//! key once per element and nested maps flatten to `key[subkey]`.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// A single query parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    /// Skipped when encoding.
    Null,
    /// Stringified scalar.
    Scalar(String),
    /// Emitted once per element under the same key.
    List(Vec<QueryValue>),
    /// Flattened as `key[subkey]`.
    Map(Query),
}

impl QueryValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Ordered mapping of parameter names to values. Keys are unique.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    entries: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing a previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder form of [`Query::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.insert(key, value);
        }
        query
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from!(&str, String, &String, bool, i32, i64, u32, u64, usize, f64);

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Query> for QueryValue {
    fn from(query: Query) -> Self {
        Self::Map(query)
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => flag.into(),
            Value::Number(number) => Self::Scalar(number.to_string()),
            Value::String(text) => Self::Scalar(text),
            Value::Array(items) => items.into(),
            Value::Object(map) => Self::Map(map.into_iter().collect()),
        }
    }
}

/// A parsed query parameter: one value, or every value of a repeated key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryParam {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryParam {
    /// All values in order of appearance.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multiple(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                let first = std::mem::take(first);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

fn flatten(key: &str, value: &QueryValue, out: &mut Vec<(String, String)>) {
    match value {
        QueryValue::Null => {}
        QueryValue::Scalar(text) => out.push((key.to_owned(), text.clone())),
        QueryValue::List(items) => {
            for item in items {
                flatten(key, item, out);
            }
        }
        QueryValue::Map(nested) => {
            for (sub, item) in nested.iter() {
                flatten(&format!("{key}[{sub}]"), item, out);
            }
        }
    }
}

fn serialize(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Encodes `params` as `?a=1&b=2`, or `""` when nothing is emitted.
pub fn encode(params: &Query) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params.iter() {
        flatten(key, value, &mut pairs);
    }
    let encoded = serialize(&pairs);
    if encoded.is_empty() {
        encoded
    } else {
        format!("?{encoded}")
    }
}

/// Merges `params` into the query string of `url`.
///
/// Every non-null key in `params` replaces all existing occurrences of that key.
/// Null keys and keys absent from `params` leave the URL's entries untouched. A
/// `#fragment` is preserved at the end.
pub fn merge_into_url(url: &str, params: &Query) -> String {
    if params.is_empty() {
        return url.to_owned();
    }

    let (without_fragment, fragment) = match url.find('#') {
        Some(index) => url.split_at(index),
        None => (url, ""),
    };
    let (base, existing) = match without_fragment.split_once('?') {
        Some((base, existing)) => (base, existing),
        None => (without_fragment, ""),
    };

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(existing.as_bytes())
        .into_owned()
        .collect();
    for (key, value) in params.iter() {
        if value.is_null() {
            continue;
        }
        pairs.retain(|(existing_key, _)| existing_key != key);
        flatten(key, value, &mut pairs);
    }

    let query = serialize(&pairs);
    if query.is_empty() {
        format!("{base}{fragment}")
    } else {
        format!("{base}?{query}{fragment}")
    }
}

/// Parses the query string of `url`, ignoring any fragment.
pub fn parse(url: &str) -> BTreeMap<String, QueryParam> {
    let mut out = BTreeMap::new();
    let Some((_, rest)) = url.split_once('?') else {
        return out;
    };
    let raw = rest.split_once('#').map_or(rest, |(query, _)| query);

    for (key, value) in form_urlencoded::parse(raw.as_bytes()).into_owned() {
        match out.get_mut(&key) {
            Some(param) => param.push(value),
            None => {
                out.insert(key, QueryParam::Single(value));
            }
        }
    }
    out
}

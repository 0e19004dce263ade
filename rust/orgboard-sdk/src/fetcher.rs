//! Translates a [`QueryState`] into one search request and normalizes the reply.

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::query::{QueryState, ResultPage};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use url::Url;

/// Characters `encodeURIComponent` leaves untouched, minus `'`: `Url` escapes
/// a quote in http(s) queries anyway, so it is encoded up front to keep the
/// query string and the sent URL identical.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

/// A remote collection that can be searched page by page.
#[async_trait]
pub trait CollectionSource<T>: Send + Sync {
    async fn fetch(&self, query: &QueryState) -> Result<ResultPage<T>, ApiError>;
}

/// How a search route wants default parameters expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// Leave out an empty `search` and `searchBy=all`.
    #[default]
    OmitDefaults,
    /// Always send every parameter, empty strings included.
    Explicit,
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Builds the query string for a search route.
pub fn search_query_string(query: &QueryState, style: ParamStyle) -> String {
    let mut params: Vec<(&str, String)> = Vec::with_capacity(6);

    let omit = style == ParamStyle::OmitDefaults;
    if !(omit && query.search_by.is_all()) {
        params.push(("searchBy", encode_component(query.search_by.as_str())));
    }
    if !(omit && query.search.is_empty()) {
        params.push(("search", encode_component(&query.search)));
    }
    params.push(("page", query.page.to_string()));
    params.push(("pageSize", query.page_size.to_string()));
    params.push(("sortBy", encode_component(&query.sort_by)));
    params.push(("sortDirection", query.sort_direction.as_str().to_string()));

    params
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `GET <path>?searchBy&search&page&pageSize&sortBy&sortDirection`.
/// No caching: every call is a full round trip.
pub struct SearchEndpoint<T> {
    client: ApiClient,
    path: String,
    style: ParamStyle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SearchEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            style: self.style,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for SearchEndpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEndpoint")
            .field("path", &self.path)
            .field("style", &self.style)
            .finish()
    }
}

impl<T> SearchEndpoint<T> {
    pub fn new(client: ApiClient, path: impl Into<String>, style: ParamStyle) -> Self {
        Self {
            client,
            path: path.into(),
            style,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn style(&self) -> ParamStyle {
        self.style
    }

    pub fn url_for(&self, query: &QueryState) -> Result<Url, ApiError> {
        if query.page_size == 0 {
            return Err(ApiError::InvalidQuery("page size must be positive".to_string()));
        }
        let mut url = self.client.endpoint(&self.path)?;
        url.set_query(Some(&search_query_string(query, self.style)));
        Ok(url)
    }
}

#[async_trait]
impl<T> CollectionSource<T> for SearchEndpoint<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, query: &QueryState) -> Result<ResultPage<T>, ApiError> {
        let url = self.url_for(query)?;
        let mut page: ResultPage<T> = self.client.get_json(url).await?;
        let dropped = page.truncate_to(query.page_size);
        if dropped > 0 {
            tracing::warn!(
                "{} returned {} rows beyond page size {}",
                self.path,
                dropped,
                query.page_size
            );
        }
        Ok(page)
    }
}

//! `CatalogSearch` over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use super::{CatalogSearch, SearchMatch};
use crate::error_handling::OperationError;

/// Catalog API client.
///
/// Endpoints, relative to the base URL:
/// - `GET search/upc/{upc}`
/// - `GET search/mpn/{mpn}`
/// - `GET search?q={text}`
///
/// Each returns a JSON array of matches. Any non-2xx response becomes an
/// `OperationError` carrying the status code, so a 429 is recognized as
/// throttling by the rate limiter.
#[derive(Debug, Clone)]
pub struct HttpCatalogSearch {
    client: Client,
    base_url: Url,
}

impl HttpCatalogSearch {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        // Keep a trailing slash so endpoints extend the path instead of replacing its tail
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(HttpCatalogSearch { client, base_url })
    }

    /// The API root all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, OperationError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OperationError::new("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_matches(&self, url: Url) -> Result<Vec<SearchMatch>, OperationError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            OperationError {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Request to {} failed: {}", url.path(), e),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OperationError::with_status(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        response
            .json::<Vec<SearchMatch>>()
            .await
            .map_err(|e| OperationError::new(format!("Invalid search response: {}", e)))
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unexpected status")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}

#[async_trait]
impl CatalogSearch for HttpCatalogSearch {
    async fn search_by_upc(&self, upc: &str) -> Result<Vec<SearchMatch>, OperationError> {
        let url = self.endpoint(&["search", "upc", upc])?;
        self.fetch_matches(url).await
    }

    async fn search_by_mpn(&self, mpn: &str) -> Result<Vec<SearchMatch>, OperationError> {
        let url = self.endpoint(&["search", "mpn", mpn])?;
        self.fetch_matches(url).await
    }

    async fn search_by_text(&self, text: &str) -> Result<Vec<SearchMatch>, OperationError> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().append_pair("q", text);
        self.fetch_matches(url).await
    }
}

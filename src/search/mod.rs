//! Catalog search collaborator.
//!
//! The job processor looks rows up through a `CatalogSearch` implementation.
//! `HttpCatalogSearch` talks to a catalog API over HTTP; tests supply their
//! own fakes.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error_handling::OperationError;

pub use http::HttpCatalogSearch;

/// A catalog entry returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Identifier of the entry in the external catalog
    pub external_id: String,
    /// Entry title
    pub title: String,
    /// Brand, when the catalog knows it
    #[serde(default)]
    pub brand: Option<String>,
    /// Catalog category
    #[serde(default)]
    pub category: Option<String>,
    /// Listed price
    #[serde(default)]
    pub price: Option<f64>,
    /// Relevance rank reported by the catalog
    #[serde(default)]
    pub rank: Option<u32>,
    /// Product image
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SearchMatch {
    /// A match with only an id and a title.
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        SearchMatch {
            external_id: external_id.into(),
            title: title.into(),
            brand: None,
            category: None,
            price: None,
            rank: None,
            image_url: None,
        }
    }
}

/// Search operations against the external catalog.
///
/// Each operation either returns the (possibly empty) list of matches or an
/// `OperationError` carrying the upstream status and message, so throttling
/// can be recognized and retried.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Exact lookup by primary identifier (UPC/GTIN/EAN).
    async fn search_by_upc(&self, upc: &str) -> Result<Vec<SearchMatch>, OperationError>;

    /// Lookup by manufacturer part number.
    async fn search_by_mpn(&self, mpn: &str) -> Result<Vec<SearchMatch>, OperationError>;

    /// Free-text search.
    async fn search_by_text(&self, text: &str) -> Result<Vec<SearchMatch>, OperationError>;
}

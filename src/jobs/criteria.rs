//! Row normalization.
//!
//! Input rows are arbitrary string maps. `RowQuery::from_row` recognizes the
//! columns the lookup understands (case- and separator-insensitive) and picks
//! the strongest search mode the row supports.

use std::collections::HashMap;

use super::types::{SearchCriteria, SearchMethod};
use crate::config::{
    PRIORITY_FREE_TEXT, PRIORITY_PRIMARY_IDENTIFIER, PRIORITY_SECONDARY_IDENTIFIER,
};

const PRIMARY_COLUMNS: &[&str] = &["upc", "gtin", "ean", "barcode"];
const SECONDARY_COLUMNS: &[&str] = &["mpn", "part_number", "manufacturer_part_number", "sku"];
const DESCRIPTION_COLUMNS: &[&str] = &["description", "title", "name", "product_name"];
const BRAND_COLUMNS: &[&str] = &["brand", "manufacturer"];
const MODEL_COLUMNS: &[&str] = &["model", "model_number"];

/// Descriptive fields used to build a free-text query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextQuery {
    /// Free-text description
    pub description: Option<String>,
    /// Brand
    pub brand: Option<String>,
    /// Model
    pub model: Option<String>,
}

impl TextQuery {
    /// The search string, or `None` when there is nothing to search for.
    ///
    /// Brand and model are prepended unless the description already mentions
    /// them (case-insensitive).
    pub fn search_text(&self) -> Option<String> {
        let description_lower = self
            .description
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut parts: Vec<&str> = [&self.brand, &self.model]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|extra| !description_lower.contains(&extra.to_lowercase()))
            .collect();
        if let Some(description) = self.description.as_deref() {
            parts.push(description);
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    fn is_empty(&self) -> bool {
        self.description.is_none() && self.brand.is_none() && self.model.is_none()
    }
}

/// What a row can be searched by, strongest mode first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowQuery {
    /// Has a primary identifier. Falls back to the secondary identifier, then
    /// to free text.
    PrimaryIdentifier {
        /// Normalized primary identifier
        upc: String,
        /// Secondary identifier, if the row has one
        mpn: Option<String>,
        /// Free-text fallback
        text: TextQuery,
    },
    /// Has a secondary identifier but no primary one. Falls back to free text.
    SecondaryIdentifier {
        /// Secondary identifier
        mpn: String,
        /// Free-text fallback
        text: TextQuery,
    },
    /// Only descriptive fields.
    FreeText(TextQuery),
    /// Nothing to search by; the row is skipped.
    Unrecognized,
}

impl RowQuery {
    /// Classifies a raw row.
    pub fn from_row(row: &HashMap<String, String>) -> Self {
        let columns: HashMap<String, &str> = row
            .iter()
            .map(|(key, value)| (normalize_column(key), value.trim()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        let pick = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| columns.get(*alias))
                .map(|value| value.to_string())
        };

        let upc = pick(PRIMARY_COLUMNS).and_then(|raw| normalize_identifier(&raw));
        let mpn = pick(SECONDARY_COLUMNS);
        let text = TextQuery {
            description: pick(DESCRIPTION_COLUMNS),
            brand: pick(BRAND_COLUMNS),
            model: pick(MODEL_COLUMNS),
        };

        match (upc, mpn) {
            (Some(upc), mpn) => RowQuery::PrimaryIdentifier { upc, mpn, text },
            (None, Some(mpn)) => RowQuery::SecondaryIdentifier { mpn, text },
            (None, None) if !text.is_empty() => RowQuery::FreeText(text),
            (None, None) => RowQuery::Unrecognized,
        }
    }

    /// Queue priority for the row's request.
    pub fn priority(&self) -> Option<i32> {
        match self {
            RowQuery::PrimaryIdentifier { .. } => Some(PRIORITY_PRIMARY_IDENTIFIER),
            RowQuery::SecondaryIdentifier { .. } => Some(PRIORITY_SECONDARY_IDENTIFIER),
            RowQuery::FreeText(_) => Some(PRIORITY_FREE_TEXT),
            RowQuery::Unrecognized => None,
        }
    }

    /// Lookup strategy for the row.
    pub fn method(&self) -> Option<SearchMethod> {
        match self {
            RowQuery::PrimaryIdentifier { .. } => Some(SearchMethod::ExactIdentifier),
            RowQuery::SecondaryIdentifier { .. } => Some(SearchMethod::SecondaryIdentifier),
            RowQuery::FreeText(_) => Some(SearchMethod::FreeText),
            RowQuery::Unrecognized => None,
        }
    }

    /// The identifiers recorded on the row's result.
    pub fn criteria(&self) -> SearchCriteria {
        let (upc, mpn, text) = match self {
            RowQuery::PrimaryIdentifier { upc, mpn, text } => {
                (Some(upc.clone()), mpn.clone(), Some(text))
            }
            RowQuery::SecondaryIdentifier { mpn, text } => (None, Some(mpn.clone()), Some(text)),
            RowQuery::FreeText(text) => (None, None, Some(text)),
            RowQuery::Unrecognized => (None, None, None),
        };
        let text = text.cloned().unwrap_or_default();
        SearchCriteria {
            upc,
            mpn,
            description: text.description,
            brand: text.brand,
            model: text.model,
        }
    }
}

/// `"Part Number"`, `part-number` and `PART_NUMBER` all become `part_number`.
fn normalize_column(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '.' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Strips quoting and whitespace that spreadsheets leave around barcodes.
fn normalize_identifier(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '`'))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

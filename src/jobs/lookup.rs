//! Per-row search with fallbacks.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::criteria::RowQuery;
use crate::error_handling::OperationError;
use crate::search::{CatalogSearch, SearchMatch};

/// Runs the fallback chain for one row.
///
/// Intermediate failures are swallowed; only the error of the last search
/// attempted is returned. An empty match list is a success and does not
/// trigger a fallback.
pub(crate) async fn lookup_row(
    search: &dyn CatalogSearch,
    query: &RowQuery,
) -> Result<Vec<SearchMatch>, OperationError> {
    match query {
        RowQuery::PrimaryIdentifier { upc, mpn, text } => {
            let mut last_error = match search.search_by_upc(upc).await {
                Ok(matches) => return Ok(matches),
                Err(e) => e,
            };
            if let Some(mpn) = mpn {
                log::debug!("UPC search for {} failed ({}), trying MPN {}", upc, last_error, mpn);
                last_error = match search.search_by_mpn(mpn).await {
                    Ok(matches) => return Ok(matches),
                    Err(e) => e,
                };
            }
            match text.search_text() {
                Some(text) => {
                    log::debug!("Identifier search for {} failed ({}), trying free text", upc, last_error);
                    search.search_by_text(&text).await
                }
                None => Err(last_error),
            }
        }
        RowQuery::SecondaryIdentifier { mpn, text } => {
            let last_error = match search.search_by_mpn(mpn).await {
                Ok(matches) => return Ok(matches),
                Err(e) => e,
            };
            match text.search_text() {
                Some(text) => {
                    log::debug!("MPN search for {} failed ({}), trying free text", mpn, last_error);
                    search.search_by_text(&text).await
                }
                None => Err(last_error),
            }
        }
        RowQuery::FreeText(text) => match text.search_text() {
            Some(text) => search.search_by_text(&text).await,
            None => Err(OperationError::new("Row has no searchable text")),
        },
        RowQuery::Unrecognized => Err(OperationError::new("Row has nothing to search by")),
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    attempts: u32,
    first_started: Option<Instant>,
    last_finished: Option<Instant>,
}

/// Attempt accounting for one row, shared with the operation the limiter runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct RowProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl RowProbe {
    pub fn attempt_started(&self) {
        let mut state = self.state.lock();
        state.attempts += 1;
        state.first_started.get_or_insert_with(Instant::now);
    }

    pub fn attempt_finished(&self) {
        self.state.lock().last_finished = Some(Instant::now());
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    /// Time from the first attempt's start to the last attempt's end.
    pub fn elapsed_ms(&self) -> u64 {
        let state = self.state.lock();
        match (state.first_started, state.last_finished) {
            (Some(start), Some(end)) => {
                u64::try_from(end.saturating_duration_since(start).as_millis()).unwrap_or(u64::MAX)
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::criteria::TextQuery;
    use async_trait::async_trait;

    /// Records calls; fails any search whose argument is listed in `failing`.
    #[derive(Default)]
    struct ScriptedSearch {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSearch {
        fn respond(&self, kind: &str, arg: &str) -> Result<Vec<SearchMatch>, OperationError> {
            self.calls.lock().push(format!("{}:{}", kind, arg));
            if self.failing.iter().any(|f| *f == arg) {
                Err(OperationError::with_status(404, format!("{} {} not found", kind, arg)))
            } else {
                Ok(vec![SearchMatch::new(format!("{}-{}", kind, arg), "hit")])
            }
        }
    }

    #[async_trait]
    impl CatalogSearch for ScriptedSearch {
        async fn search_by_upc(&self, upc: &str) -> Result<Vec<SearchMatch>, OperationError> {
            self.respond("upc", upc)
        }
        async fn search_by_mpn(&self, mpn: &str) -> Result<Vec<SearchMatch>, OperationError> {
            self.respond("mpn", mpn)
        }
        async fn search_by_text(&self, text: &str) -> Result<Vec<SearchMatch>, OperationError> {
            self.respond("text", text)
        }
    }

    fn primary(text: TextQuery) -> RowQuery {
        RowQuery::PrimaryIdentifier {
            upc: "111".into(),
            mpn: Some("M-1".into()),
            text,
        }
    }

    #[tokio::test]
    async fn test_primary_hit_stops_chain() {
        let search = ScriptedSearch::default();
        let matches = lookup_row(&search, &primary(TextQuery::default())).await.unwrap();
        assert_eq!(matches[0].external_id, "upc-111");
        assert_eq!(*search.calls.lock(), vec!["upc:111"]);
    }

    #[tokio::test]
    async fn test_primary_falls_back_to_mpn_then_text() {
        let search = ScriptedSearch {
            failing: vec!["111", "M-1"],
            ..Default::default()
        };
        let query = primary(TextQuery {
            description: Some("drill".into()),
            ..Default::default()
        });
        let matches = lookup_row(&search, &query).await.unwrap();
        assert_eq!(matches[0].external_id, "text-drill");
        assert_eq!(*search.calls.lock(), vec!["upc:111", "mpn:M-1", "text:drill"]);
    }

    #[tokio::test]
    async fn test_only_last_error_propagates() {
        let search = ScriptedSearch {
            failing: vec!["111", "M-1"],
            ..Default::default()
        };
        let err = lookup_row(&search, &primary(TextQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.message, "mpn M-1 not found");
    }

    #[tokio::test]
    async fn test_secondary_falls_back_to_text() {
        let search = ScriptedSearch {
            failing: vec!["M-2", "Acme drill"],
            ..Default::default()
        };
        let query = RowQuery::SecondaryIdentifier {
            mpn: "M-2".into(),
            text: TextQuery {
                description: Some("drill".into()),
                brand: Some("Acme".into()),
                model: None,
            },
        };
        let err = lookup_row(&search, &query).await.unwrap_err();
        assert_eq!(err.message, "text Acme drill not found");
        assert_eq!(*search.calls.lock(), vec!["mpn:M-2", "text:Acme drill"]);
    }

    #[tokio::test]
    async fn test_empty_matches_do_not_fall_back() {
        struct Empty;
        #[async_trait]
        impl CatalogSearch for Empty {
            async fn search_by_upc(&self, _: &str) -> Result<Vec<SearchMatch>, OperationError> {
                Ok(Vec::new())
            }
            async fn search_by_mpn(&self, _: &str) -> Result<Vec<SearchMatch>, OperationError> {
                Err(OperationError::new("should not be called"))
            }
            async fn search_by_text(&self, _: &str) -> Result<Vec<SearchMatch>, OperationError> {
                Err(OperationError::new("should not be called"))
            }
        }
        let matches = lookup_row(&Empty, &primary(TextQuery::default())).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_counts_attempts_and_elapsed() {
        let probe = RowProbe::default();
        assert_eq!(probe.elapsed_ms(), 0);
        probe.attempt_started();
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        probe.attempt_finished();
        probe.attempt_started();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        probe.attempt_finished();
        assert_eq!(probe.attempts(), 2);
        assert_eq!(probe.elapsed_ms(), 300);
    }
}

// src/fetch/paginator.rs
//! Drives the page fetcher across pages for one term.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::diagnostics::{PageDiagnostics, StopReason};
use crate::error::FetchError;
use crate::fetch::fetcher::PageFetcher;
use crate::fetch::pacer::RequestPacer;
use crate::fetch::types::{SearchFilters, SearchRecord, PAGE_CEILING};

/// Everything collected for one term. Owned by the paginating worker until
/// handed to the deduplicator.
#[derive(Debug, Clone)]
pub struct TermResultSet {
    pub term: String,
    /// In page order; may contain duplicates if the ranking shifted.
    pub records: Vec<SearchRecord>,
    pub pages_fetched: u32,
    pub total_available: Option<u64>,
    pub malformed: usize,
    pub pages: Vec<PageDiagnostics>,
    pub stop: StopReason,
    /// The failure that ended pagination, if any.
    pub error: Option<FetchError>,
}

impl TermResultSet {
    fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
            records: Vec::new(),
            pages_fetched: 0,
            total_available: None,
            malformed: 0,
            pages: Vec::new(),
            stop: StopReason::Exhausted,
            error: None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.stop.is_partial()
    }

    /// The very first page could not be fetched even after retrying.
    pub fn first_page_unreachable(&self) -> bool {
        matches!(self.stop, StopReason::RetriesExhausted { page: 0, .. })
    }
}

#[derive(Clone)]
pub struct Paginator {
    fetcher: PageFetcher,
    request_delay: Duration,
}

impl Paginator {
    pub fn new(fetcher: PageFetcher, request_delay: Duration) -> Self {
        Self {
            fetcher,
            request_delay,
        }
    }

    /// Fetch pages `0..min(max_pages, PAGE_CEILING)` until the endpoint runs
    /// out of results, a page fails for good, or the run is cancelled.
    pub async fn paginate(
        &self,
        term: &str,
        max_pages: u32,
        filters: &SearchFilters,
        cancel: &CancelToken,
    ) -> TermResultSet {
        let limit = max_pages.min(PAGE_CEILING);
        let mut pacer = RequestPacer::new(self.request_delay);
        let mut set = TermResultSet::new(term);
        let mut page = 0u32;

        let stop = loop {
            if page >= limit {
                break StopReason::PageLimit { pages: limit };
            }
            if pacer.wait_turn(cancel).await.is_err() {
                break StopReason::Cancelled { page };
            }

            let fetch = self.fetcher.fetch(term, page, filters, cancel).await;
            let mut diag = PageDiagnostics {
                page,
                attempts: fetch.attempts,
                retries: fetch.retries(),
                records: 0,
                malformed: 0,
                error: None,
            };

            match fetch.result {
                Ok(p) => {
                    diag.records = p.records.len();
                    diag.malformed = p.malformed;
                    set.pages.push(diag);
                    set.pages_fetched += 1;
                    set.malformed += p.malformed;
                    if p.total_available.is_some() {
                        set.total_available = p.total_available;
                    }
                    set.records.extend(p.records);
                    tracing::info!(
                        term,
                        page,
                        fetched = set.pages.last().map(|d| d.records).unwrap_or(0),
                        collected = set.records.len(),
                        "page collected"
                    );
                    if !p.has_more {
                        break StopReason::Exhausted;
                    }
                }
                Err(err) => {
                    diag.error = Some(err.to_string());
                    set.pages.push(diag);
                    set.error = Some(err.clone());
                    break self.stop_for(term, page, err);
                }
            }
            page += 1;
        };

        if stop.is_partial() {
            tracing::warn!(
                term,
                collected = set.records.len(),
                "partial result set for term {term}, stopped at page {}",
                stop.stopped_at().unwrap_or(page)
            );
        }
        set.stop = stop;
        set
    }

    fn stop_for(&self, term: &str, page: u32, err: FetchError) -> StopReason {
        match err {
            FetchError::Cancelled => StopReason::Cancelled { page },
            FetchError::Status { status } if page > 0 && matches!(status, 400 | 422) => {
                tracing::info!(term, page, status, "reached endpoint page limit");
                StopReason::EndpointLimit { page, status }
            }
            FetchError::RetriesExhausted { attempts, ref last } => StopReason::RetriesExhausted {
                page,
                attempts,
                cause: last.to_string(),
            },
            other => StopReason::Fatal {
                page,
                cause: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::backoff::BackoffPolicy;
    use crate::fetch::mock::{numbered_page, ScriptedTransport};
    use crate::fetch::types::RawResponse;
    use std::sync::Arc;

    fn paginator(t: &Arc<ScriptedTransport>) -> Paginator {
        Paginator::new(
            PageFetcher::new(t.clone(), BackoffPolicy::default()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_endpoint_runs_dry() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("X", 0, RawResponse::ok(numbered_page(1, 20, "2025-01-01", true)))
                .respond("X", 1, RawResponse::ok(numbered_page(21, 5, "2025-01-02", false))),
        );
        let set = paginator(&t)
            .paginate("X", 10, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(set.pages_fetched, 2);
        assert_eq!(set.records.len(), 25);
        assert_eq!(set.stop, StopReason::Exhausted);
        assert_eq!(t.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_configured_max_pages() {
        let t = Arc::new(
            ScriptedTransport::new()
                .with_fallback(RawResponse::ok(numbered_page(1, 20, "2025-01-01", true))),
        );
        let set = paginator(&t)
            .paginate("X", 3, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(set.pages_fetched, 3);
        assert_eq!(set.stop, StopReason::PageLimit { pages: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_page_keeps_earlier_pages() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("X", 0, RawResponse::ok(numbered_page(1, 20, "2025-01-01", true)))
                .respond("X", 1, RawResponse::status(404)),
        );
        let set = paginator(&t)
            .paginate("X", 10, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(set.records.len(), 20);
        assert!(set.is_partial());
        assert!(matches!(set.stop, StopReason::Fatal { page: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_request_after_first_page_is_endpoint_limit() {
        let t = Arc::new(
            ScriptedTransport::new()
                .respond("X", 0, RawResponse::ok(numbered_page(1, 20, "2025-01-01", true)))
                .respond("X", 1, RawResponse::status(400)),
        );
        let set = paginator(&t)
            .paginate("X", 10, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(set.stop, StopReason::EndpointLimit { page: 1, status: 400 });
        assert!(!set.is_partial());
    }

    #[tokio::test(start_paused = true)]
    async fn pages_are_spaced_by_request_delay() {
        let t = Arc::new(
            ScriptedTransport::new()
                .with_fallback(RawResponse::ok(numbered_page(1, 20, "2025-01-01", true))),
        );
        let started = tokio::time::Instant::now();
        paginator(&t)
            .paginate("X", 4, &SearchFilters::default(), &CancelToken::new())
            .await;
        // Three gaps between four requests.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }
}

// src/fetch/fetcher.rs
//! One (term, page) request with bounded retry.

use std::sync::Arc;

use metrics::{counter, histogram};

use crate::cancel::CancelToken;
use crate::error::FetchError;
use crate::fetch::backoff::{BackoffPolicy, RetryDecision};
use crate::fetch::types::{PageQuery, RawResponse, SearchFilters, SearchPage, SearchTransport};

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(SearchPage),
    RateLimited {
        retry_after: Option<std::time::Duration>,
    },
    ServerError {
        status: u16,
    },
    TransportFailed(String),
    Fatal(FetchError),
}

impl AttemptOutcome {
    pub fn classify(
        transport: &dyn SearchTransport,
        response: Result<RawResponse, FetchError>,
    ) -> Self {
        let resp = match response {
            Ok(r) => r,
            Err(FetchError::Transport(msg)) => return AttemptOutcome::TransportFailed(msg),
            Err(other) => return AttemptOutcome::Fatal(other),
        };
        match resp.status {
            200..=299 => match transport.parse_page(&resp.body) {
                Ok(page) => AttemptOutcome::Success(page),
                Err(e) => AttemptOutcome::Fatal(e),
            },
            429 => AttemptOutcome::RateLimited {
                retry_after: resp.retry_after,
            },
            s if BackoffPolicy::is_retryable(s) => AttemptOutcome::ServerError { status: s },
            s => AttemptOutcome::Fatal(FetchError::Status { status: s }),
        }
    }

    fn into_error(self) -> Option<FetchError> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::RateLimited { .. } => Some(FetchError::Transient { status: 429 }),
            AttemptOutcome::ServerError { status } => Some(FetchError::Transient { status }),
            AttemptOutcome::TransportFailed(msg) => Some(FetchError::Transport(msg)),
            AttemptOutcome::Fatal(e) => Some(e),
        }
    }
}

/// One attempt at one page. Lives only inside [`PageFetcher::fetch`].
#[derive(Debug)]
pub struct FetchAttempt<'a> {
    pub term: &'a str,
    pub page_index: u32,
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

impl FetchAttempt<'_> {
    fn log(&self) {
        let (term, page, attempt) = (self.term, self.page_index, self.attempt_number);
        match &self.outcome {
            AttemptOutcome::Success(p) => tracing::debug!(
                term,
                page,
                attempt,
                records = p.records.len(),
                has_more = p.has_more,
                "page fetched"
            ),
            AttemptOutcome::RateLimited { .. } => {
                tracing::warn!(term, page, attempt, status = 429, "rate limited")
            }
            AttemptOutcome::ServerError { status } => {
                tracing::warn!(term, page, attempt, status, "transient server error")
            }
            AttemptOutcome::TransportFailed(msg) => {
                tracing::warn!(term, page, attempt, error = %msg, "transport failure")
            }
            AttemptOutcome::Fatal(e) => {
                tracing::warn!(term, page, attempt, error = %e, "fatal page error")
            }
        }
    }
}

/// Result of fetching one page, retries included.
#[derive(Debug)]
pub struct PageFetch {
    pub page: u32,
    pub attempts: u32,
    pub result: Result<SearchPage, FetchError>,
}

impl PageFetch {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn SearchTransport>,
    policy: BackoffPolicy,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn SearchTransport>, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Fetch `page` for `term`, retrying transient failures per the backoff
    /// policy. Cancellation aborts both the in-flight request and any backoff
    /// wait.
    pub async fn fetch(
        &self,
        term: &str,
        page: u32,
        filters: &SearchFilters,
        cancel: &CancelToken,
    ) -> PageFetch {
        let query = PageQuery {
            term,
            page,
            filters,
        };
        let mut attempt_number = 0u32;

        loop {
            attempt_number += 1;
            let t0 = std::time::Instant::now();
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return PageFetch {
                        page,
                        attempts: attempt_number,
                        result: Err(FetchError::Cancelled),
                    };
                }
                r = self.transport.get_page(&query) => r,
            };
            histogram!("tracker_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            counter!("tracker_fetch_attempts_total").increment(1);

            let attempt = FetchAttempt {
                term,
                page_index: page,
                attempt_number,
                outcome: AttemptOutcome::classify(self.transport.as_ref(), response),
            };
            attempt.log();

            let decision = match &attempt.outcome {
                AttemptOutcome::Success(_) | AttemptOutcome::Fatal(_) => RetryDecision::GiveUp,
                AttemptOutcome::RateLimited { retry_after } => {
                    self.policy
                        .decide_with_hint(attempt_number, 429, *retry_after)
                }
                AttemptOutcome::ServerError { status } => {
                    self.policy.decide(attempt_number, *status)
                }
                AttemptOutcome::TransportFailed(_) => self.policy.schedule(attempt_number),
            };

            let retryable = matches!(
                attempt.outcome,
                AttemptOutcome::RateLimited { .. }
                    | AttemptOutcome::ServerError { .. }
                    | AttemptOutcome::TransportFailed(_)
            );

            let result = match (attempt.outcome, decision) {
                (AttemptOutcome::Success(p), _) => Ok(p),
                (outcome, RetryDecision::Retry(delay)) => {
                    counter!("tracker_fetch_retries_total").increment(1);
                    tracing::info!(
                        term,
                        page,
                        attempt = attempt_number,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        cause = ?outcome,
                        "backing off before retry"
                    );
                    if cancel.sleep(delay).await.is_err() {
                        return PageFetch {
                            page,
                            attempts: attempt_number,
                            result: Err(FetchError::Cancelled),
                        };
                    }
                    continue;
                }
                (outcome, RetryDecision::GiveUp) => {
                    let last = outcome
                        .into_error()
                        .unwrap_or(FetchError::Status { status: 0 });
                    counter!("tracker_fetch_fatal_total").increment(1);
                    if retryable {
                        tracing::warn!(
                            term,
                            page,
                            attempts = attempt_number,
                            "retries exhausted"
                        );
                        Err(FetchError::RetriesExhausted {
                            attempts: attempt_number,
                            last: Box::new(last),
                        })
                    } else {
                        Err(last)
                    }
                }
            };

            return PageFetch {
                page,
                attempts: attempt_number,
                result,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{numbered_page, ScriptedTransport};
    use std::time::Duration;

    fn fetcher(t: ScriptedTransport) -> (Arc<ScriptedTransport>, PageFetcher) {
        let t = Arc::new(t);
        let f = PageFetcher::new(t.clone(), BackoffPolicy::default());
        (t, f)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_statuses_retry_then_succeed() {
        let (t, f) = fetcher(
            ScriptedTransport::new()
                .statuses("Y", 2, &[429, 503])
                .respond("Y", 2, RawResponse::ok(numbered_page(1, 3, "2025-01-01", false))),
        );
        let started = tokio::time::Instant::now();
        let out = f
            .fetch("Y", 2, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(out.attempts, 3);
        assert_eq!(out.retries(), 2);
        assert_eq!(out.result.unwrap().records.len(), 3);
        assert_eq!(t.request_count("Y", 2), 3);
        // 10s + 20s of backoff.
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_on_first_attempt() {
        let (t, f) = fetcher(ScriptedTransport::new().statuses("X", 0, &[404]));
        let out = f
            .fetch("X", 0, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(out.attempts, 1);
        assert_eq!(out.result.unwrap_err(), FetchError::Status { status: 404 });
        assert_eq!(t.request_count("X", 0), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_exhausts_after_six_attempts() {
        let (t, f) = fetcher(ScriptedTransport::new().statuses("X", 0, &[429]));
        let out = f
            .fetch("X", 0, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(out.attempts, 6);
        assert_eq!(t.request_count("X", 0), 6);
        match out.result.unwrap_err() {
            FetchError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 6);
                assert_eq!(*last, FetchError::Transient { status: 429 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried() {
        let (_t, f) = fetcher(
            ScriptedTransport::new()
                .fail("X", 0, "connection reset")
                .respond("X", 0, RawResponse::ok(numbered_page(1, 1, "2025-01-01", false))),
        );
        let out = f
            .fetch("X", 0, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(out.retries(), 1);
        assert!(out.result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_success_body_is_fatal() {
        let (_t, f) = fetcher(
            ScriptedTransport::new().respond("X", 0, RawResponse::ok("not json")),
        );
        let out = f
            .fetch("X", 0, &SearchFilters::default(), &CancelToken::new())
            .await;
        assert_eq!(out.attempts, 1);
        assert!(matches!(out.result, Err(FetchError::Envelope(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_returns_promptly() {
        let (_t, f) = fetcher(ScriptedTransport::new().statuses("X", 0, &[429]));
        let cancel = CancelToken::new();
        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            c.cancel();
        });
        let started = tokio::time::Instant::now();
        let out = f.fetch("X", 0, &SearchFilters::default(), &cancel).await;
        assert_eq!(out.result.unwrap_err(), FetchError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

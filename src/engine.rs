//! # Run Engine
//! Orchestrates one tracking run: paginate every term, dedupe, bucket per
//! granularity, aggregate. Output depends only on the records the endpoint
//! returned, never on fetch timing or concurrency.
//!
//! Per-page failures degrade to partial result sets recorded in the
//! diagnostics. The run itself fails only on bad configuration, on an
//! unreachable first page for the first term, or on outside cancellation
//! (which still hands back whatever completed).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::gauge;
use serde::Serialize;

use crate::aggregate::{aggregate, TermSeries};
use crate::bucket::{bucket, count_unbucketable, record_unbucketable_metric, Granularity};
use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::dedup::{dedupe, TermRecords};
use crate::diagnostics::{RunDiagnostics, StopReason, TermDiagnostics};
use crate::error::{FetchError, RunError};
use crate::fetch::fetcher::PageFetcher;
use crate::fetch::paginator::{Paginator, TermResultSet};
use crate::fetch::providers::substack::SubstackTransport;
use crate::fetch::types::SearchTransport;

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// One entry per requested granularity, terms in input order.
    pub series: BTreeMap<Granularity, Vec<TermSeries>>,
    /// Canonical records per term, terms in input order.
    pub records: Vec<TermRecords>,
    pub diagnostics: RunDiagnostics,
}

impl RunReport {
    pub fn series_for(&self, granularity: Granularity) -> Option<&[TermSeries]> {
        self.series.get(&granularity).map(Vec::as_slice)
    }

    pub fn records_for(&self, term: &str) -> Option<&TermRecords> {
        self.records.iter().find(|r| r.term == term)
    }

    pub fn is_partial(&self) -> bool {
        self.diagnostics.is_partial()
    }
}

pub struct Engine {
    transport: Arc<dyn SearchTransport>,
    config: RunConfig,
}

impl Engine {
    pub fn new(config: RunConfig, transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            transport,
            config: config.sanitized(),
        }
    }

    /// Engine talking to the live search endpoint named in `config`.
    pub fn with_substack(config: RunConfig) -> Result<Self, RunError> {
        let transport = SubstackTransport::new(config.base_url.clone(), config.request_timeout())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn run(&self, cancel: &CancelToken) -> Result<RunReport, RunError> {
        let cfg = &self.config;
        cfg.validate()?;
        crate::metrics::ensure_described();

        let started_at = Utc::now();
        tracing::info!(
            terms = ?cfg.terms,
            max_pages = cfg.max_pages,
            concurrency = cfg.concurrency,
            transport = self.transport.name(),
            "run started"
        );

        let paginator = Paginator::new(
            PageFetcher::new(self.transport.clone(), cfg.backoff()),
            cfg.request_delay(),
        );
        let filters = cfg.filters();
        // Lets a dead endpoint stop sibling streams without touching the caller's token.
        let run_cancel = cancel.child();

        let mut sets: Vec<(usize, TermResultSet)> = stream::iter(cfg.terms.iter().enumerate())
            .map(|(idx, term)| {
                let paginator = &paginator;
                let filters = &filters;
                let run_cancel = &run_cancel;
                async move {
                    let set = paginator
                        .paginate(term, cfg.max_pages, filters, run_cancel)
                        .await;
                    if idx == 0 && set.first_page_unreachable() {
                        tracing::error!(term = %term, "first page unreachable, aborting run");
                        run_cancel.cancel();
                    }
                    (idx, set)
                }
            })
            .buffer_unordered(cfg.concurrency.max(1))
            .collect()
            .await;
        run_cancel.cancel();
        sets.sort_by_key(|(idx, _)| *idx);
        let sets: Vec<TermResultSet> = sets.into_iter().map(|(_, s)| s).collect();

        if let Some(first) = sets.first().filter(|s| s.first_page_unreachable()) {
            let cause = first.error.clone().unwrap_or_else(|| FetchError::RetriesExhausted {
                attempts: cfg.max_retries + 1,
                last: Box::new(FetchError::Transport("unknown".into())),
            });
            return Err(RunError::EndpointUnreachable {
                term: first.term.clone(),
                cause,
            });
        }

        let records = dedupe(&sets);

        let mut series = BTreeMap::new();
        for &granularity in &cfg.granularities {
            let buckets = bucket(&records, granularity);
            series.insert(granularity, aggregate(&buckets, cfg.engagement));
        }

        let unbucketable = count_unbucketable(&records);
        record_unbucketable_metric(unbucketable.iter().map(|(_, n)| n).sum());

        let cancelled = cancel.is_cancelled();
        let diagnostics = RunDiagnostics {
            started_at,
            finished_at: Utc::now(),
            cancelled,
            terms: term_diagnostics(&sets, &records, &unbucketable),
        };
        gauge!("tracker_run_last_ts").set(diagnostics.finished_at.timestamp() as f64);

        for note in diagnostics.terms.iter().filter_map(TermDiagnostics::partial_note) {
            tracing::warn!("{note}");
        }
        tracing::info!(
            terms = records.len(),
            records = records.iter().map(TermRecords::len).sum::<usize>(),
            retries = diagnostics.retry_count(),
            unbucketable = diagnostics.unbucketable(),
            partial = diagnostics.is_partial(),
            "run finished"
        );

        let report = RunReport {
            series,
            records,
            diagnostics,
        };
        if cancelled {
            return Err(RunError::Cancelled(Box::new(report)));
        }
        Ok(report)
    }
}

/// One entry per canonical term; repeated result sets for a term are summed.
fn term_diagnostics(
    sets: &[TermResultSet],
    records: &[TermRecords],
    unbucketable: &[(String, usize)],
) -> Vec<TermDiagnostics> {
    records
        .iter()
        .map(|tr| {
            let mine: Vec<&TermResultSet> = sets.iter().filter(|s| s.term == tr.term).collect();
            // Last stream decides the stop reason; any partial stream makes the term partial.
            let stop = mine
                .last()
                .map(|s| s.stop.clone())
                .unwrap_or(StopReason::Exhausted);
            TermDiagnostics {
                term: tr.term.clone(),
                pages_fetched: mine.iter().map(|s| s.pages_fetched).sum(),
                total_available: mine.iter().find_map(|s| s.total_available),
                records_fetched: mine.iter().map(|s| s.records.len()).sum(),
                records_kept: tr.len(),
                duplicates_dropped: tr.duplicates_dropped,
                malformed_records: mine.iter().map(|s| s.malformed).sum(),
                unbucketable: unbucketable
                    .iter()
                    .find(|(t, _)| *t == tr.term)
                    .map(|(_, n)| *n)
                    .unwrap_or(0),
                partial: mine.iter().any(|s| s.is_partial()),
                stop,
                pages: mine.iter().flat_map(|s| s.pages.iter().cloned()).collect(),
            }
        })
        .collect()
}

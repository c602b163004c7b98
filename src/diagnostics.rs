// src/diagnostics.rs
//! Run diagnostics: everything that degraded without failing the run.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDiagnostics {
    pub page: u32,
    pub attempts: u32,
    pub retries: u32,
    pub records: usize,
    pub malformed: usize,
    pub error: Option<String>,
}

/// Why pagination for a term ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// The endpoint reported no further results.
    Exhausted,
    /// Configured page budget (or the absolute ceiling) reached.
    PageLimit { pages: u32 },
    /// 400/422 after the first page: the endpoint's own page limit.
    EndpointLimit { page: u32, status: u16 },
    /// Transient failures outlasted the retry budget.
    RetriesExhausted { page: u32, attempts: u32, cause: String },
    /// Non-retryable failure on a page.
    Fatal { page: u32, cause: String },
    Cancelled { page: u32 },
}

impl StopReason {
    /// True when pages that should have been fetched were not.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            StopReason::RetriesExhausted { .. }
                | StopReason::Fatal { .. }
                | StopReason::Cancelled { .. }
        )
    }

    pub fn stopped_at(&self) -> Option<u32> {
        match self {
            StopReason::RetriesExhausted { page, .. }
            | StopReason::Fatal { page, .. }
            | StopReason::Cancelled { page }
            | StopReason::EndpointLimit { page, .. } => Some(*page),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermDiagnostics {
    pub term: String,
    pub pages_fetched: u32,
    pub total_available: Option<u64>,
    pub records_fetched: usize,
    pub records_kept: usize,
    pub duplicates_dropped: usize,
    pub malformed_records: usize,
    pub unbucketable: usize,
    pub partial: bool,
    pub stop: StopReason,
    pub pages: Vec<PageDiagnostics>,
}

impl TermDiagnostics {
    pub fn retry_count(&self) -> u32 {
        self.pages.iter().map(|p| p.retries).sum()
    }

    pub fn page(&self, page: u32) -> Option<&PageDiagnostics> {
        self.pages.iter().find(|p| p.page == page)
    }

    /// Human-readable note for partial result sets.
    pub fn partial_note(&self) -> Option<String> {
        if !self.partial {
            return None;
        }
        let page = self.stop.stopped_at().unwrap_or(self.pages_fetched);
        Some(format!(
            "partial result set for term {}, stopped at page {}",
            self.term, page
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunDiagnostics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub terms: Vec<TermDiagnostics>,
}

impl RunDiagnostics {
    pub fn term(&self, term: &str) -> Option<&TermDiagnostics> {
        self.terms.iter().find(|t| t.term == term)
    }

    pub fn unbucketable(&self) -> usize {
        self.terms.iter().map(|t| t.unbucketable).sum()
    }

    pub fn retry_count(&self) -> u32 {
        self.terms.iter().map(TermDiagnostics::retry_count).sum()
    }

    pub fn is_partial(&self) -> bool {
        self.cancelled || self.terms.iter().any(|t| t.partial)
    }
}

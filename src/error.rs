// src/error.rs
//! Error taxonomy for the fetch pipeline and the run as a whole.
//!
//! Per-page and per-record failures never escape a run; they end up in
//! [`crate::diagnostics`]. Only [`RunError`] reaches the caller.

use crate::engine::RunReport;

/// Why a single page request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// 429 / 502 / 503. Eligible for retry.
    #[error("transient HTTP status {status}")]
    Transient { status: u16 },

    /// Connection, timeout or body-read failure. Eligible for retry.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other non-2xx status.
    #[error("fatal HTTP status {status}")]
    Status { status: u16 },

    /// The response body is not a search envelope at all.
    #[error("malformed response envelope: {0}")]
    Envelope(String),

    #[error("retries exhausted after {attempts} attempts (last: {last})")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },

    #[error("run cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::Transport(_))
    }

    /// HTTP status carried by this error, looking through retry exhaustion.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transient { status } | FetchError::Status { status } => Some(*status),
            FetchError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// A record in a response that could not be turned into a `SearchRecord`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record: {reason}")]
pub struct MalformedRecord {
    pub reason: String,
}

/// Terminal failures of a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// The very first page of the very first term could not be fetched.
    #[error("search endpoint unreachable for term {term:?}: {cause}")]
    EndpointUnreachable { term: String, cause: FetchError },

    /// Cancelled from outside; carries whatever was completed.
    #[error("run cancelled; partial results for {} term(s)", .0.records.len())]
    Cancelled(Box<RunReport>),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl RunError {
    /// The partial report of a cancelled run.
    pub fn partial_report(&self) -> Option<&RunReport> {
        match self {
            RunError::Cancelled(report) => Some(report),
            _ => None,
        }
    }
}

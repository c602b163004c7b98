// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod bucket;
pub mod cancel;
pub mod config;
pub mod dedup;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod report;
pub mod rolling;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Series, SeriesPoint, TermSeries};
pub use crate::bucket::Granularity;
pub use crate::cancel::CancelToken;
pub use crate::config::RunConfig;
pub use crate::diagnostics::{RunDiagnostics, StopReason, TermDiagnostics};
pub use crate::engine::{Engine, RunReport};
pub use crate::error::{FetchError, RunError};

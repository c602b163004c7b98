// src/fetch/mod.rs
//! Retrieval side of the pipeline: transport, retry, pacing, pagination.

pub mod backoff;
pub mod fetcher;
pub mod mock;
pub mod pacer;
pub mod paginator;
pub mod providers;
pub mod types;

pub use backoff::{BackoffPolicy, RetryDecision};
pub use fetcher::{PageFetch, PageFetcher};
pub use pacer::RequestPacer;
pub use paginator::{Paginator, TermResultSet};
pub use types::{
    ContentFilter, DateRange, RecordId, SearchFilters, SearchRecord, SearchTransport,
    PAGE_CEILING, PAGE_SIZE,
};

// src/fetch/types.rs
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Results per page returned by the search endpoint.
pub const PAGE_SIZE: usize = 20;
/// Endpoint-imposed page ceiling (100 pages ≈ 2000 records per term).
pub const PAGE_CEILING: u32 = 100;

/// Opaque record identifier. Numeric ids from the endpoint are kept as their
/// decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        RecordId(n.to_string())
    }
}

/// One matched article. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: RecordId,
    pub title: Option<String>,
    pub url: Option<String>,
    pub publication_name: Option<String>,
    /// Publication timestamp exactly as delivered (ISO-8601).
    pub published_at: Option<String>,
    pub reaction_count: u64,
    pub comment_count: u64,
    pub word_count: u64,
}

impl SearchRecord {
    /// Minimal record, mostly for tests and fixtures.
    pub fn new(id: impl Into<RecordId>, published_at: Option<&str>, reaction_count: u64) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: None,
            publication_name: None,
            published_at: published_at.map(str::to_string),
            reaction_count,
            comment_count: 0,
            word_count: 0,
        }
    }

    pub fn published_utc(&self) -> Option<DateTime<Utc>> {
        self.published_at.as_deref().and_then(parse_published)
    }

    /// UTC calendar date used for bucketing.
    pub fn published_date(&self) -> Option<NaiveDate> {
        self.published_utc().map(|dt| dt.date_naive())
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (with `Z` or an offset, optional fractional seconds),
/// naive date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    #[default]
    All,
    Free,
    Paid,
}

impl ContentFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFilter::All => "all",
            ContentFilter::Free => "free",
            ContentFilter::Paid => "paid",
        }
    }
}

/// Relative publication window supported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Day,
    Week,
    Month,
    Year,
}

impl DateRange {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::Day => "day",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub content: ContentFilter,
    pub date_range: Option<DateRange>,
    pub include_platform_results: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            content: ContentFilter::All,
            date_range: None,
            include_platform_results: true,
        }
    }
}

/// One (term, page) request.
#[derive(Debug, Clone, Copy)]
pub struct PageQuery<'a> {
    pub term: &'a str,
    pub page: u32,
    pub filters: &'a SearchFilters,
}

/// What came back over the wire, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, if the server sent one in seconds.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }
}

/// A successfully parsed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub records: Vec<SearchRecord>,
    pub has_more: bool,
    pub total_available: Option<u64>,
    /// Results in the envelope that could not be turned into records.
    pub malformed: usize,
}

/// The HTTP boundary. Implementations only move bytes; the page fetcher owns
/// retry and classification.
#[async_trait::async_trait]
pub trait SearchTransport: Send + Sync {
    /// Perform one GET. Network-level failures map to [`FetchError::Transport`].
    async fn get_page(&self, query: &PageQuery<'_>) -> Result<RawResponse, FetchError>;

    /// Turn a 2xx body into a page. Defaults to the Substack envelope.
    fn parse_page(&self, body: &str) -> Result<SearchPage, FetchError> {
        crate::fetch::providers::substack::parse_search_page(body)
    }

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_common_timestamp_shapes() {
        let z = parse_published("2025-06-12T14:03:00.000Z").unwrap();
        assert_eq!((z.year(), z.month(), z.day(), z.hour()), (2025, 6, 12, 14));

        // Offset shifts the UTC date.
        let off = parse_published("2025-06-12T01:30:00+02:00").unwrap();
        assert_eq!(off.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());

        let naive = parse_published("2025-06-12T14:03:00").unwrap();
        assert_eq!(naive.hour(), 14);

        let date_only = parse_published("2025-06-12").unwrap();
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn empty_or_garbage_dates_are_none() {
        assert!(parse_published("").is_none());
        assert!(parse_published("   ").is_none());
        assert!(parse_published("yesterday").is_none());

        let rec = SearchRecord::new("1", Some(""), 3);
        assert!(rec.published_date().is_none());
        let rec = SearchRecord::new("1", None, 3);
        assert!(rec.published_date().is_none());
    }
}

// src/fetch/providers/substack.rs
//! Substack post search (`GET /api/v1/post/search`).
//!
//! The API is undocumented and drifts; everything that knows its envelope
//! lives here. A result that does not fit the expected shape is dropped and
//! counted, it never fails the page.

use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use serde::Deserialize;

use crate::error::{FetchError, MalformedRecord};
use crate::fetch::types::{
    PageQuery, RawResponse, RecordId, SearchPage, SearchRecord, SearchTransport, PAGE_SIZE,
};

pub const DEFAULT_BASE_URL: &str = "https://substack.com/api/v1/post/search";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct SubstackTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SubstackTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Query string for one page, in the order the endpoint documents it.
pub fn query_params(query: &PageQuery<'_>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("query", query.term.to_string()),
        ("page", query.page.to_string()),
        (
            "includePlatformResults",
            query.filters.include_platform_results.to_string(),
        ),
        ("filter", query.filters.content.as_str().to_string()),
    ];
    if let Some(range) = query.filters.date_range {
        params.push(("dateRange", range.as_str().to_string()));
    }
    params
}

#[async_trait]
impl SearchTransport for SubstackTransport {
    async fn get_page(&self, query: &PageQuery<'_>) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("reading body: {e}")))?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "substack"
    }
}

/// `Retry-After` in delta-seconds. HTTP-date values are ignored and the
/// backoff schedule applies instead.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    results: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    more: Option<bool>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<RawId>,
    title: Option<String>,
    post_date: Option<String>,
    canonical_url: Option<String>,
    reaction_count: Option<i64>,
    comment_count: Option<i64>,
    wordcount: Option<i64>,
    #[serde(rename = "publishedBylines")]
    published_bylines: Option<Vec<Byline>>,
}

#[derive(Debug, Deserialize)]
struct Byline {
    #[serde(rename = "publicationUsers")]
    publication_users: Option<Vec<PublicationUser>>,
}

#[derive(Debug, Deserialize)]
struct PublicationUser {
    publication: Option<Publication>,
}

#[derive(Debug, Deserialize)]
struct Publication {
    name: Option<String>,
}

fn non_negative(v: Option<i64>) -> u64 {
    v.map(|n| n.max(0) as u64).unwrap_or(0)
}

fn publication_name(bylines: Option<Vec<Byline>>) -> Option<String> {
    bylines?
        .into_iter()
        .next()?
        .publication_users?
        .into_iter()
        .next()?
        .publication?
        .name
}

/// Convert one raw result into a record.
pub fn parse_post(value: serde_json::Value) -> Result<SearchRecord, MalformedRecord> {
    let post: Post = serde_json::from_value(value).map_err(|e| MalformedRecord {
        reason: e.to_string(),
    })?;
    let id = match post.id {
        Some(RawId::Num(n)) => RecordId::from(n),
        Some(RawId::Str(s)) if !s.trim().is_empty() => RecordId(s.trim().to_string()),
        _ => {
            return Err(MalformedRecord {
                reason: "missing id".to_string(),
            })
        }
    };
    Ok(SearchRecord {
        id,
        title: post.title,
        url: post.canonical_url,
        publication_name: publication_name(post.published_bylines),
        published_at: post.post_date,
        reaction_count: non_negative(post.reaction_count),
        comment_count: non_negative(post.comment_count),
        word_count: non_negative(post.wordcount),
    })
}

/// Parse a 2xx body. `has_more` is false when the endpoint says so, when the
/// page is short, or when it is empty.
pub fn parse_search_page(body: &str) -> Result<SearchPage, FetchError> {
    let t0 = std::time::Instant::now();
    let env: Envelope =
        serde_json::from_str(body).map_err(|e| FetchError::Envelope(e.to_string()))?;

    let raw = env.results.unwrap_or_default();
    let raw_count = raw.len();
    let mut records = Vec::with_capacity(raw_count);
    let mut malformed = 0usize;
    for value in raw {
        match parse_post(value) {
            Ok(rec) => records.push(rec),
            Err(e) => {
                malformed += 1;
                tracing::debug!(reason = %e.reason, "dropping malformed search result");
            }
        }
    }

    let has_more = raw_count >= PAGE_SIZE && env.more != Some(false);

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("tracker_parse_ms").record(ms);
    counter!("tracker_records_total").increment(records.len() as u64);
    counter!("tracker_records_malformed_total").increment(malformed as u64);

    Ok(SearchPage {
        records,
        has_more,
        total_available: env.total,
        malformed,
    })
}

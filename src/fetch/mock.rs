// src/fetch/mock.rs
//! Scripted in-memory transport for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use crate::error::FetchError;
use crate::fetch::types::{PageQuery, RawResponse, SearchTransport};

#[derive(Debug, Clone)]
pub enum Scripted {
    Response(RawResponse),
    TransportError(String),
}

impl From<RawResponse> for Scripted {
    fn from(r: RawResponse) -> Self {
        Scripted::Response(r)
    }
}

/// Replays queued responses per `(term, page)`. Once a queue runs dry its
/// last entry keeps being served; unscripted pages get the fallback (an
/// empty final page unless configured).
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<(String, u32), VecDeque<Scripted>>>,
    fallback: Scripted,
    latency: Duration,
    requests: Mutex<Vec<(String, u32, Instant)>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Scripted::Response(RawResponse::ok(page_json(vec![], false))),
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one response for `(term, page)`.
    pub fn respond(self, term: &str, page: u32, reply: impl Into<Scripted>) -> Self {
        self.scripts
            .lock()
            .expect("scripted transport mutex poisoned")
            .entry((term.to_string(), page))
            .or_default()
            .push_back(reply.into());
        self
    }

    /// Queue a sequence of bare statuses, e.g. `[429, 429]`, before the
    /// responses queued afterwards.
    pub fn statuses(self, term: &str, page: u32, statuses: &[u16]) -> Self {
        statuses.iter().fold(self, |t, s| {
            t.respond(term, page, RawResponse::status(*s))
        })
    }

    pub fn fail(self, term: &str, page: u32, message: &str) -> Self {
        self.respond(term, page, Scripted::TransportError(message.to_string()))
    }

    pub fn with_fallback(mut self, reply: impl Into<Scripted>) -> Self {
        self.fallback = reply.into();
        self
    }

    /// Simulated round-trip time for every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every `(term, page)` requested so far, in order.
    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests
            .lock()
            .expect("scripted transport mutex poisoned")
            .iter()
            .map(|(t, p, _)| (t.clone(), *p))
            .collect()
    }

    /// When each request for `term` was sent, oldest first.
    pub fn request_times(&self, term: &str) -> Vec<Instant> {
        self.requests
            .lock()
            .expect("scripted transport mutex poisoned")
            .iter()
            .filter(|(t, _, _)| t == term)
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub fn request_count(&self, term: &str, page: u32) -> usize {
        self.requests
            .lock()
            .expect("scripted transport mutex poisoned")
            .iter()
            .filter(|(t, p, _)| t == term && *p == page)
            .count()
    }

    fn next_reply(&self, term: &str, page: u32) -> Scripted {
        let mut scripts = self.scripts.lock().expect("scripted transport mutex poisoned");
        match scripts.get_mut(&(term.to_string(), page)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.fallback.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn get_page(&self, query: &PageQuery<'_>) -> Result<RawResponse, FetchError> {
        self.requests
            .lock()
            .expect("scripted transport mutex poisoned")
            .push((query.term.to_string(), query.page, Instant::now()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.next_reply(query.term, query.page) {
            Scripted::Response(r) => Ok(r),
            Scripted::TransportError(msg) => Err(FetchError::Transport(msg)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// One search result in the endpoint's JSON shape.
pub fn post_json(id: u64, post_date: Option<&str>, reactions: u64) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Post {id}"),
        "post_date": post_date,
        "canonical_url": format!("https://example.substack.com/p/post-{id}"),
        "reaction_count": reactions,
        "comment_count": 0,
        "wordcount": 800,
    })
}

pub fn page_json(posts: Vec<serde_json::Value>, more: bool) -> String {
    json!({ "results": posts, "more": more }).to_string()
}

/// A page of `n` posts with consecutive ids starting at `first_id`, all
/// published at `post_date`.
pub fn numbered_page(first_id: u64, n: usize, post_date: &str, more: bool) -> String {
    let posts = (0..n as u64)
        .map(|i| post_json(first_id + i, Some(post_date), 1))
        .collect();
    page_json(posts, more)
}

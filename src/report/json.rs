// src/report/json.rs
//! Detailed export: per-term bucket counts and every kept post, plus the run
//! diagnostics.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::diagnostics::RunDiagnostics;
use crate::engine::RunReport;
use crate::fetch::types::{RecordId, SearchRecord};

const UNKNOWN_PUBLICATION: &str = "Unknown";

#[derive(Debug, Serialize)]
pub struct DetailedExport<'a> {
    pub terms: TermMap<'a>,
    pub diagnostics: &'a RunDiagnostics,
}

/// Terms in query order, serialized as a JSON object.
#[derive(Debug, Default)]
pub struct TermMap<'a>(pub Vec<(&'a str, TermExport<'a>)>);

impl<'a> TermMap<'a> {
    pub fn get(&self, term: &str) -> Option<&TermExport<'a>> {
        self.0.iter().find(|(t, _)| *t == term).map(|(_, e)| e)
    }
}

impl Serialize for TermMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(t, e)| (t, e)))
    }
}

#[derive(Debug, Serialize)]
pub struct TermExport<'a> {
    pub total_posts: usize,
    /// `monthly_counts` / `daily_counts`, keyed by bucket label.
    #[serde(flatten)]
    pub counts: BTreeMap<String, BTreeMap<String, u64>>,
    /// Newest first.
    pub posts: Vec<PostExport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct PostExport<'a> {
    pub id: &'a RecordId,
    pub title: Option<&'a str>,
    pub post_date: Option<&'a str>,
    pub canonical_url: Option<&'a str>,
    pub publication_name: &'a str,
    pub reaction_count: u64,
    pub comment_count: u64,
    pub wordcount: u64,
}

impl<'a> From<&'a SearchRecord> for PostExport<'a> {
    fn from(r: &'a SearchRecord) -> Self {
        Self {
            id: &r.id,
            title: r.title.as_deref(),
            post_date: r.published_at.as_deref(),
            canonical_url: r.url.as_deref(),
            publication_name: r.publication_name.as_deref().unwrap_or(UNKNOWN_PUBLICATION),
            reaction_count: r.reaction_count,
            comment_count: r.comment_count,
            wordcount: r.word_count,
        }
    }
}

pub fn build(report: &RunReport) -> DetailedExport<'_> {
    let mut terms = TermMap::default();
    for tr in &report.records {
        let mut counts = BTreeMap::new();
        for (granularity, series) in &report.series {
            let Some(ts) = series.iter().find(|s| s.term == tr.term) else {
                continue;
            };
            let labelled: BTreeMap<String, u64> = ts
                .count
                .points
                .iter()
                .map(|p| (granularity.label(p.date), p.value))
                .collect();
            counts.insert(format!("{}_counts", granularity.as_str()), labelled);
        }

        let mut posts: Vec<PostExport<'_>> = tr.records.iter().map(PostExport::from).collect();
        posts.sort_by(|a, b| b.post_date.unwrap_or("").cmp(a.post_date.unwrap_or("")));

        terms.0.push((
            tr.term.as_str(),
            TermExport {
                total_posts: tr.len(),
                counts,
                posts,
            },
        ));
    }
    DetailedExport {
        terms,
        diagnostics: &report.diagnostics,
    }
}

pub fn render(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&build(report))
}

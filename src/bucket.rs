// src/bucket.rs
//! Calendar bucketing of canonical records.
//!
//! Records are grouped by the UTC date of `published_at`, truncated to the
//! chosen granularity. All terms share one gap-free timeline spanning the
//! run's earliest and latest observed buckets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Months, NaiveDate};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::dedup::TermRecords;
use crate::fetch::types::RecordId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    /// Bucket key for a date: the date itself, or the first of its month.
    pub fn key_for(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn next(self, key: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Daily => key.succ_opt(),
            Granularity::Monthly => key.checked_add_months(Months::new(1)),
        }
    }

    /// `2025-06-12` or `2025-06`.
    pub fn label(self, key: NaiveDate) -> String {
        match self {
            Granularity::Daily => key.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => key.format("%Y-%m").to_string(),
        }
    }

    /// Column header for the time axis.
    pub fn axis_name(self) -> &'static str {
        match self {
            Granularity::Daily => "Day",
            Granularity::Monthly => "Month",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    pub ids: BTreeSet<RecordId>,
    pub reaction_total: u64,
}

impl Bucket {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermBuckets {
    pub term: String,
    pub buckets: BTreeMap<NaiveDate, Bucket>,
    /// Records with a missing or unparseable publication date.
    pub unbucketable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSet {
    pub granularity: Granularity,
    /// Every key from the earliest to the latest observed bucket.
    pub timeline: Vec<NaiveDate>,
    pub terms: Vec<TermBuckets>,
}

impl BucketSet {
    pub fn term(&self, term: &str) -> Option<&TermBuckets> {
        self.terms.iter().find(|t| t.term == term)
    }

    pub fn get(&self, term: &str, key: NaiveDate) -> Option<&Bucket> {
        self.term(term)?.buckets.get(&key)
    }

    pub fn unbucketable(&self) -> usize {
        self.terms.iter().map(|t| t.unbucketable).sum()
    }
}

/// Group each term's records into buckets and zero-fill the shared timeline.
pub fn bucket(terms: &[TermRecords], granularity: Granularity) -> BucketSet {
    let mut out = Vec::with_capacity(terms.len());

    for tr in terms {
        let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        let mut unbucketable = 0usize;
        for rec in &tr.records {
            let Some(date) = rec.published_date() else {
                unbucketable += 1;
                tracing::debug!(
                    term = %tr.term,
                    id = %rec.id,
                    published_at = ?rec.published_at,
                    "record has no usable publication date"
                );
                continue;
            };
            let b = buckets.entry(granularity.key_for(date)).or_default();
            if b.ids.insert(rec.id.clone()) {
                b.reaction_total = b.reaction_total.saturating_add(rec.reaction_count);
            }
        }
        if unbucketable > 0 {
            tracing::warn!(term = %tr.term, unbucketable, "records excluded from buckets");
        }
        out.push(TermBuckets {
            term: tr.term.clone(),
            buckets,
            unbucketable,
        });
    }

    let timeline = timeline(&out, granularity);
    for tb in &mut out {
        for key in &timeline {
            tb.buckets.entry(*key).or_default();
        }
    }

    BucketSet {
        granularity,
        timeline,
        terms: out,
    }
}

fn timeline(terms: &[TermBuckets], granularity: Granularity) -> Vec<NaiveDate> {
    let first = terms.iter().filter_map(|t| t.buckets.keys().next()).min();
    let last = terms.iter().filter_map(|t| t.buckets.keys().next_back()).max();
    let (Some(&first), Some(&last)) = (first, last) else {
        return Vec::new();
    };

    let mut keys = Vec::new();
    let mut cur = Some(first);
    while let Some(k) = cur {
        if k > last {
            break;
        }
        keys.push(k);
        cur = granularity.next(k);
    }
    keys
}

/// Records without a usable date across all terms; independent of
/// granularity.
pub fn count_unbucketable(terms: &[TermRecords]) -> Vec<(String, usize)> {
    terms
        .iter()
        .map(|tr| {
            let n = tr
                .records
                .iter()
                .filter(|r| r.published_date().is_none())
                .count();
            (tr.term.clone(), n)
        })
        .collect()
}

/// Publish the unbucketable tally once per run.
pub(crate) fn record_unbucketable_metric(total: usize) {
    counter!("tracker_unbucketable_total").increment(total as u64);
}

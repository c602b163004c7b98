// src/dedup.rs
//! Canonical per-term record sets.
//!
//! Ids are scoped per term: an article matching two terms stays in both.
//! Within a term the first-seen copy wins.

use std::collections::{HashMap, HashSet};

use metrics::counter;
use serde::Serialize;

use crate::fetch::paginator::TermResultSet;
use crate::fetch::types::{RecordId, SearchRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermRecords {
    pub term: String,
    /// First-seen order, unique by id.
    pub records: Vec<SearchRecord>,
    pub duplicates_dropped: usize,
}

impl TermRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Merge result sets into one canonical record list per term. Terms keep the
/// order in which they first appear; result sets for the same term are
/// merged.
pub fn dedupe(sets: &[TermResultSet]) -> Vec<TermRecords> {
    let mut out: Vec<TermRecords> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut seen: Vec<HashSet<RecordId>> = Vec::new();

    for set in sets {
        let slot = *index.entry(set.term.as_str()).or_insert_with(|| {
            out.push(TermRecords {
                term: set.term.clone(),
                records: Vec::with_capacity(set.records.len()),
                duplicates_dropped: 0,
            });
            seen.push(HashSet::new());
            out.len() - 1
        });

        for rec in &set.records {
            if seen[slot].insert(rec.id.clone()) {
                out[slot].records.push(rec.clone());
            } else {
                out[slot].duplicates_dropped += 1;
                tracing::debug!(term = %set.term, id = %rec.id, "duplicate record within term, keeping first");
            }
        }
    }

    let dropped: usize = out.iter().map(|t| t.duplicates_dropped).sum();
    counter!("tracker_dedup_dropped_total").increment(dropped as u64);
    out
}

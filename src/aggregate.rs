// src/aggregate.rs
//! Buckets → ordered series per term.
//!
//! Pure and deterministic: for fixed buckets the output is reproducible
//! bit for bit.

use chrono::NaiveDate;
use serde::Serialize;

use crate::bucket::{BucketSet, Granularity};
use crate::rolling::{trailing_means, DEFAULT_WINDOW};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint<T> {
    pub date: NaiveDate,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series<T> {
    pub points: Vec<SeriesPoint<T>>,
}

impl<T: Copy> Series<T> {
    pub fn values(&self) -> Vec<T> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn at(&self, date: NaiveDate) -> Option<T> {
        self.points.iter().find(|p| p.date == date).map(|p| p.value)
    }
}

impl<T> Series<T> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl<T> FromIterator<(NaiveDate, T)> for Series<T> {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, T)>>(iter: I) -> Self {
        Series {
            points: iter
                .into_iter()
                .map(|(date, value)| SeriesPoint { date, value })
                .collect(),
        }
    }
}

/// All series for one term at one granularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermSeries {
    pub term: String,
    pub granularity: Granularity,
    pub count: Series<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_reactions: Option<Series<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_reactions: Option<Series<u64>>,
    /// Daily only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_avg_reactions: Option<Series<f64>>,
}

impl TermSeries {
    pub fn total_count(&self) -> u64 {
        self.count.points.iter().map(|p| p.value).sum()
    }
}

pub fn aggregate(buckets: &BucketSet, compute_engagement: bool) -> Vec<TermSeries> {
    buckets
        .terms
        .iter()
        .map(|tb| {
            let count: Series<u64> = tb
                .buckets
                .iter()
                .map(|(date, b)| (*date, b.count() as u64))
                .collect();

            let (avg_reactions, total_reactions, rolling_avg_reactions) = if compute_engagement {
                let total: Series<u64> = tb
                    .buckets
                    .iter()
                    .map(|(date, b)| (*date, b.reaction_total))
                    .collect();
                let avg: Series<f64> = tb
                    .buckets
                    .iter()
                    .map(|(date, b)| (*date, average(b.reaction_total, b.count())))
                    .collect();
                let rolling = (buckets.granularity == Granularity::Daily).then(|| {
                    let means = trailing_means(&avg.values(), DEFAULT_WINDOW);
                    avg.points
                        .iter()
                        .zip(means)
                        .map(|(p, m)| (p.date, m))
                        .collect::<Series<f64>>()
                });
                (Some(avg), Some(total), rolling)
            } else {
                (None, None, None)
            };

            TermSeries {
                term: tb.term.clone(),
                granularity: buckets.granularity,
                count,
                avg_reactions,
                total_reactions,
                rolling_avg_reactions,
            }
        })
        .collect()
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

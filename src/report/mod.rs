// src/report/mod.rs
//! Renderers for a finished run. The text writers return a `String` and the
//! binary decides where it goes; the chart draws straight to a PNG file.

pub mod chart;
pub mod csv;
pub mod json;
pub mod table;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::aggregate::TermSeries;
use crate::bucket::Granularity;
use crate::engine::RunReport;

/// Shared bucket keys of a series set (every term carries the same timeline).
pub fn timeline(series: &[TermSeries]) -> Vec<NaiveDate> {
    series
        .first()
        .map(|s| s.count.points.iter().map(|p| p.date).collect())
        .unwrap_or_default()
}

/// Series the chart draws: monthly when requested, otherwise daily.
pub fn chart_series(report: &RunReport) -> Option<(Granularity, &[TermSeries])> {
    [Granularity::Monthly, Granularity::Daily]
        .into_iter()
        .find_map(|g| report.series_for(g).map(|s| (g, s)))
}

/// True when at least one granularity has at least one bucket.
pub fn has_results(report: &RunReport) -> bool {
    report.series.values().any(|s| !timeline(s).is_empty())
}

/// Write `content` to `path`, creating parent directories.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = content.len(), "output written");
    Ok(())
}

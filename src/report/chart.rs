// src/report/chart.rs
//! Line chart of bucket counts as PNG, one line per term.
//!
//! Text needs a TrueType font. One is looked up once per process
//! (`$MENTION_TRACKER_CHART_FONT`, then common system paths). Without one the
//! chart still gets its lines and legend swatches, just no captions or labels.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::aggregate::TermSeries;
use crate::bucket::Granularity;
use crate::report::timeline;

pub const ENV_CHART_FONT: &str = "MENTION_TRACKER_CHART_FONT";

const SIZE: (u32, u32) = (1400, 600);
const FONT_FAMILY: &str = "sans-serif";
const MAX_X_LABELS: usize = 20;
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceCell<bool> = OnceCell::new();

fn ensure_font() -> bool {
    *FONT_READY.get_or_init(|| {
        let from_env = std::env::var(ENV_CHART_FONT).ok();
        let candidates = from_env
            .iter()
            .map(String::as_str)
            .chain(FONT_CANDIDATES.iter().copied());
        for path in candidates {
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            // Registered fonts must outlive every chart in the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                tracing::debug!(path, "chart font registered");
                return true;
            }
        }
        tracing::warn!("no TrueType font found, chart text skipped (set {ENV_CHART_FONT})");
        false
    })
}

fn plot_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("drawing chart: {e}")
}

/// Draw `series` to `path`, creating parent directories.
pub fn render(series: &[TermSeries], granularity: Granularity, path: &Path) -> Result<()> {
    let keys = timeline(series);
    if keys.is_empty() {
        bail!("nothing to chart");
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let with_text = ensure_font();

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let y_max = series
        .iter()
        .flat_map(|s| s.count.points.iter().map(|p| p.value))
        .max()
        .unwrap_or(0)
        .max(1);
    let x_max = keys.len().saturating_sub(1).max(1);

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if with_text {
        let title = format!(
            "Mentions per {} in Substack Articles",
            granularity.axis_name().to_lowercase()
        );
        builder
            .caption(title, (FONT_FAMILY, 28))
            .x_label_area_size(70)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(0usize..x_max, 0u64..y_max + y_max / 10 + 1)
        .map_err(plot_err)?;

    for (idx, s) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let points: Vec<(usize, u64)> = s
            .count
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.value))
            .collect();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(s.term.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
            .map_err(plot_err)?;
    }

    if with_text {
        let x_label = |i: &usize| keys.get(*i).map(|k| granularity.label(*k)).unwrap_or_default();
        chart
            .configure_mesh()
            .x_desc(granularity.axis_name())
            .y_desc("Number of Substack Articles")
            .x_labels(keys.len().min(MAX_X_LABELS))
            .x_label_formatter(&x_label)
            .light_line_style(BLACK.mix(0.05))
            .draw()
            .map_err(plot_err)?;
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    tracing::info!(path = %path.display(), terms = series.len(), buckets = keys.len(), "chart written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::bucket::bucket;
    use crate::dedup::TermRecords;
    use crate::fetch::types::SearchRecord;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn series() -> Vec<TermSeries> {
        let terms = vec![
            TermRecords {
                term: "Claude Code".into(),
                records: vec![
                    SearchRecord::new("1", Some("2025-01-04"), 0),
                    SearchRecord::new("2", Some("2025-03-09"), 0),
                    SearchRecord::new("3", Some("2025-03-10"), 0),
                ],
                duplicates_dropped: 0,
            },
            TermRecords {
                term: "AI coding".into(),
                records: vec![SearchRecord::new("4", Some("2025-02-01"), 0)],
                duplicates_dropped: 0,
            },
        ];
        aggregate(&bucket(&terms, Granularity::Monthly), false)
    }

    #[test]
    fn writes_png_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("charts/mentions.png");
        render(&series(), Granularity::Monthly, &p).unwrap();
        let bytes = fs::read(&p).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
    }

    #[test]
    fn empty_series_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty.png");
        assert!(render(&[], Granularity::Monthly, &p).is_err());
        assert!(!p.exists());
    }
}

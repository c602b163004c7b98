// src/report/table.rs
//! Fixed-width console table: one row per bucket, one column per term.

use crate::aggregate::TermSeries;
use crate::bucket::Granularity;
use crate::report::timeline;

const KEY_WIDTH: usize = 10;
const MIN_COL_WIDTH: usize = 6;

pub fn render(series: &[TermSeries], granularity: Granularity) -> String {
    let widths: Vec<usize> = series
        .iter()
        .map(|s| s.term.chars().count().max(MIN_COL_WIDTH))
        .collect();

    let mut header = format!("{:<w$}", granularity.axis_name(), w = KEY_WIDTH);
    for (s, w) in series.iter().zip(&widths) {
        header.push_str(&format!("  {:>w$}", s.term, w = *w));
    }
    let rule = "-".repeat(header.chars().count());

    let mut output = String::new();
    output.push_str(&header);
    output.push('\n');
    output.push_str(&rule);
    output.push('\n');

    for (i, key) in timeline(series).into_iter().enumerate() {
        let mut row = format!("{:<w$}", granularity.label(key), w = KEY_WIDTH);
        for (s, w) in series.iter().zip(&widths) {
            let count = s.count.points.get(i).map(|p| p.value).unwrap_or(0);
            row.push_str(&format!("  {:>w$}", count, w = *w));
        }
        output.push_str(&row);
        output.push('\n');
    }

    output.push_str(&rule);
    output.push('\n');
    let mut totals = format!("{:<w$}", "TOTAL", w = KEY_WIDTH);
    for (s, w) in series.iter().zip(&widths) {
        totals.push_str(&format!("  {:>w$}", s.total_count(), w = *w));
    }
    output.push_str(&totals);
    output.push('\n');
    output
}

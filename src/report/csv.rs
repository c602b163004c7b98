// src/report/csv.rs
//! Bucket table as CSV.
//!
//! Columns: the time axis, one count column per term, then (with engagement)
//! `<term> avg_reactions` and `<term> total_reactions` per term, plus
//! `<term> rolling_avg_reactions` for daily output. The last row is `TOTAL`.

use std::borrow::Cow;

use crate::aggregate::{SeriesPoint, TermSeries};
use crate::bucket::Granularity;
use crate::report::timeline;

pub fn render(series: &[TermSeries], granularity: Granularity) -> String {
    let engagement = series.iter().any(|s| s.avg_reactions.is_some());
    let rolling = engagement && granularity == Granularity::Daily;

    let mut header: Vec<Cow<'_, str>> = vec![Cow::Borrowed(granularity.axis_name())];
    header.extend(series.iter().map(|s| Cow::Borrowed(s.term.as_str())));
    if engagement {
        for s in series {
            header.push(Cow::Owned(format!("{} avg_reactions", s.term)));
            header.push(Cow::Owned(format!("{} total_reactions", s.term)));
            if rolling {
                header.push(Cow::Owned(format!("{} rolling_avg_reactions", s.term)));
            }
        }
    }

    let mut output = String::new();
    push_row(&mut output, header.iter().map(|c| &**c));

    for (i, key) in timeline(series).into_iter().enumerate() {
        let mut row = vec![granularity.label(key)];
        for s in series {
            row.push(s.count.points.get(i).map(|p| p.value).unwrap_or(0).to_string());
        }
        if engagement {
            for s in series {
                row.push(float_at(s.avg_reactions.as_ref().map(|a| a.points.as_slice()), i));
                row.push(
                    s.total_reactions
                        .as_ref()
                        .and_then(|t| t.points.get(i))
                        .map(|p| p.value.to_string())
                        .unwrap_or_default(),
                );
                if rolling {
                    row.push(float_at(s.rolling_avg_reactions.as_ref().map(|r| r.points.as_slice()), i));
                }
            }
        }
        push_row(&mut output, row.iter().map(String::as_str));
    }

    let mut totals = vec!["TOTAL".to_string()];
    for s in series {
        totals.push(s.total_count().to_string());
    }
    if engagement {
        for s in series {
            let posts = s.total_count();
            let reactions: u64 = s
                .total_reactions
                .as_ref()
                .map(|t| t.points.iter().map(|p| p.value).sum())
                .unwrap_or(0);
            // Overall mean per post; rolling has no meaningful total.
            let mean = if posts == 0 { 0.0 } else { reactions as f64 / posts as f64 };
            totals.push(format!("{mean:.2}"));
            totals.push(reactions.to_string());
            if rolling {
                totals.push(String::new());
            }
        }
    }
    push_row(&mut output, totals.iter().map(String::as_str));
    output
}

fn float_at(points: Option<&[SeriesPoint<f64>]>, i: usize) -> String {
    points
        .and_then(|p| p.get(i))
        .map(|p| format!("{:.2}", p.value))
        .unwrap_or_default()
}

fn push_row<'a>(output: &mut String, fields: impl Iterator<Item = &'a str>) {
    let line: Vec<Cow<'a, str>> = fields.map(escape).collect();
    output.push_str(&line.join(","));
    output.push('\n');
}

/// Quote a field when it contains a separator, quote or line break.
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::bucket::bucket;
    use crate::dedup::TermRecords;
    use crate::fetch::types::SearchRecord;

    fn terms() -> Vec<TermRecords> {
        vec![
            TermRecords {
                term: "Claude Code".into(),
                records: vec![
                    SearchRecord::new("1", Some("2025-01-01"), 10),
                    SearchRecord::new("2", Some("2025-01-01"), 20),
                    SearchRecord::new("3", Some("2025-01-03"), 5),
                ],
                duplicates_dropped: 0,
            },
            TermRecords {
                term: "AI, coding".into(),
                records: vec![SearchRecord::new("4", Some("2025-01-02"), 1)],
                duplicates_dropped: 0,
            },
        ]
    }

    #[test]
    fn counts_only() {
        let series = aggregate(&bucket(&terms(), Granularity::Monthly), false);
        let out = render(&series, Granularity::Monthly);
        assert_eq!(out, "Month,Claude Code,\"AI, coding\"\n2025-01,3,1\nTOTAL,3,1\n");
    }

    #[test]
    fn daily_engagement_columns() {
        let series = aggregate(&bucket(&terms(), Granularity::Daily), true);
        let out = render(&series, Granularity::Daily);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "Day,Claude Code,\"AI, coding\",Claude Code avg_reactions,Claude Code total_reactions,\
             Claude Code rolling_avg_reactions,\"AI, coding avg_reactions\",\
             \"AI, coding total_reactions\",\"AI, coding rolling_avg_reactions\""
        );
        assert_eq!(lines[1], "2025-01-01,2,0,15.00,30,15.00,0.00,0,0.00");
        assert_eq!(lines[2], "2025-01-02,0,1,0.00,0,7.50,1.00,1,0.50");
        assert_eq!(lines[3], "2025-01-03,1,0,5.00,5,6.67,0.00,0,0.33");
        assert_eq!(lines[4], "TOTAL,3,1,11.67,35,,1.00,1,");
    }

    #[test]
    fn escape_quotes() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

// tests/report_outputs.rs
use std::sync::Arc;

use mention_tracker::fetch::mock::{page_json, post_json, ScriptedTransport};
use mention_tracker::fetch::types::RawResponse;
use mention_tracker::report;
use mention_tracker::{CancelToken, Engine, Granularity, RunConfig};

async fn run(t: ScriptedTransport, granularities: Vec<Granularity>) -> mention_tracker::RunReport {
    let cfg = RunConfig {
        terms: vec!["Claude Code".into()],
        granularities,
        engagement: true,
        ..RunConfig::default()
    };
    Engine::new(cfg, Arc::new(t))
        .run(&CancelToken::new())
        .await
        .expect("run")
}

#[tokio::test(start_paused = true)]
async fn csv_and_json_from_one_run() {
    let t = ScriptedTransport::new().respond(
        "Claude Code",
        0,
        RawResponse::ok(page_json(
            vec![
                post_json(1, Some("2025-05-04T08:00:00Z"), 10),
                post_json(2, Some("2025-05-04T12:00:00Z"), 0),
                post_json(3, Some("2025-05-04T23:59:59Z"), 20),
            ],
            false,
        )),
    );
    let report = run(t, vec![Granularity::Daily, Granularity::Monthly]).await;
    assert!(report::has_results(&report));

    let daily = report.series_for(Granularity::Daily).unwrap();
    let csv = report::csv::render(daily, Granularity::Daily);
    assert_eq!(
        csv,
        "Day,Claude Code,Claude Code avg_reactions,Claude Code total_reactions,Claude Code rolling_avg_reactions\n\
         2025-05-04,3,10.00,30,10.00\n\
         TOTAL,3,10.00,30,\n"
    );

    let monthly = report.series_for(Granularity::Monthly).unwrap();
    let table = report::table::render(monthly, Granularity::Monthly);
    assert!(table.contains("2025-05"));
    assert!(table.lines().last().unwrap().starts_with("TOTAL"));

    let json: serde_json::Value =
        serde_json::from_str(&report::json::render(&report).unwrap()).unwrap();
    let cc = &json["terms"]["Claude Code"];
    assert_eq!(cc["total_posts"], 3);
    assert_eq!(cc["daily_counts"]["2025-05-04"], 3);
    assert_eq!(cc["monthly_counts"]["2025-05"], 3);
    assert_eq!(cc["posts"][0]["id"], "3");
    assert_eq!(json["diagnostics"]["terms"][0]["stop"]["kind"], "exhausted");
}

#[tokio::test(start_paused = true)]
async fn empty_run_has_no_results() {
    let report = run(ScriptedTransport::new(), vec![Granularity::Monthly]).await;
    assert!(!report::has_results(&report));
    assert_eq!(report.records[0].len(), 0);
}

#[tokio::test(start_paused = true)]
async fn chart_uses_monthly_series_and_writes_png() {
    let t = ScriptedTransport::new().respond(
        "Claude Code",
        0,
        RawResponse::ok(page_json(
            vec![
                post_json(1, Some("2025-04-30T08:00:00Z"), 1),
                post_json(2, Some("2025-06-01T12:00:00Z"), 2),
            ],
            false,
        )),
    );
    let report = run(t, vec![Granularity::Daily, Granularity::Monthly]).await;

    let (granularity, series) = report::chart_series(&report).expect("chartable series");
    assert_eq!(granularity, Granularity::Monthly);
    assert_eq!(series[0].count.values(), vec![1, 0, 1]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/chart.png");
    report::chart::render(series, granularity, &path).expect("chart");
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

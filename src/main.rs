//! Mention Tracker CLI
//!
//! Counts how often search terms appear in newsletter posts over time.
//!
//! Examples:
//!   mention-tracker                                   # default terms, monthly
//!   mention-tracker -q "Claude Code" -q "vibe coding" --granularity daily --engagement
//!   mention-tracker --max-pages 5 --run-timeout 600 --metrics-out metrics.prom
//!   mention-tracker --chart out/mentions.png          # or --no-chart

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use mention_tracker::bucket::Granularity;
use mention_tracker::fetch::types::{ContentFilter, DateRange};
use mention_tracker::report::{self, write_output};
use mention_tracker::{CancelToken, Engine, RunConfig, RunError, RunReport};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mention-tracker")]
#[command(about = "Track mentions of search terms in Substack posts over time")]
struct Cli {
    /// Search term to track (repeatable). Overrides the config file.
    #[arg(short = 'q', long = "query")]
    queries: Vec<String>,

    /// Config file (TOML or JSON)
    #[arg(short, long, env = "MENTION_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Max pages to fetch per term (capped at 100)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Delay in seconds between requests of one term
    #[arg(long)]
    delay: Option<f64>,

    /// Base backoff delay in seconds after a transient failure
    #[arg(long)]
    backoff_base: Option<f64>,

    /// Retries per page before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Bucket granularity (repeatable)
    #[arg(short, long, value_enum)]
    granularity: Vec<Granularity>,

    /// Also compute reaction statistics per bucket
    #[arg(long)]
    engagement: bool,

    /// Restrict results by audience
    #[arg(long, value_enum)]
    filter: Option<ContentFilter>,

    /// Restrict results to a recent window
    #[arg(long, value_enum)]
    date_range: Option<DateRange>,

    /// Exclude platform-wide results
    #[arg(long)]
    no_platform_results: bool,

    /// Terms fetched at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Search endpoint
    #[arg(long, env = "MENTION_TRACKER_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    run_timeout: Option<u64>,

    /// Output CSV path
    #[arg(short, long, default_value = "substack_mentions.csv")]
    output: PathBuf,

    /// Detailed JSON path
    #[arg(long, default_value = "substack_mentions_detailed.json")]
    json: PathBuf,

    /// Skip the detailed JSON export
    #[arg(long)]
    no_json: bool,

    /// Chart image path (PNG)
    #[arg(long, default_value = "substack_mentions_chart.png")]
    chart: PathBuf,

    /// Skip chart generation
    #[arg(long)]
    no_chart: bool,

    /// Write Prometheus metrics here after the run
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// File/env config with command-line flags layered on top.
    fn resolve_config(&self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load_from(path)?,
            None => RunConfig::load_default()?,
        };
        if !self.queries.is_empty() {
            cfg.terms = self.queries.clone();
        }
        if let Some(v) = self.max_pages {
            cfg.max_pages = v;
        }
        if let Some(v) = self.delay {
            cfg.request_delay_secs = v;
        }
        if let Some(v) = self.backoff_base {
            cfg.backoff_base_secs = v;
        }
        if let Some(v) = self.max_retries {
            cfg.max_retries = v;
        }
        if !self.granularity.is_empty() {
            cfg.granularities = self.granularity.clone();
        }
        if self.engagement {
            cfg.engagement = true;
        }
        if let Some(v) = self.filter {
            cfg.filter = v;
        }
        if self.date_range.is_some() {
            cfg.date_range = self.date_range;
        }
        if self.no_platform_results {
            cfg.include_platform_results = false;
        }
        if let Some(v) = self.concurrency {
            cfg.concurrency = v;
        }
        if let Some(v) = &self.base_url {
            cfg.base_url = v.clone();
        }
        if let Some(v) = self.request_timeout {
            cfg.request_timeout_secs = v;
        }
        if self.run_timeout.is_some() {
            cfg.run_timeout_secs = self.run_timeout;
        }
        Ok(cfg.sanitized())
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mention_tracker=info,warn"));

    // stdout carries the table; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

/// Cancel on Ctrl-C and, if configured, when the run deadline passes.
fn spawn_cancel_triggers(cancel: &CancelToken, run_timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            on_signal.cancel();
        }
    });
    if let Some(limit) = run_timeout {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::warn!(timeout_s = limit.as_secs(), "run timeout reached, cancelling run");
            on_deadline.cancel();
        });
    }
}

/// `out.csv` → `out_daily.csv`.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

fn emit(cli: &Cli, report: &RunReport) -> Result<()> {
    if !report::has_results(report) {
        println!("No results found");
        return Ok(());
    }

    let multiple = report.series.len() > 1;
    for (granularity, series) in &report.series {
        println!();
        println!("{}", report::table::render(series, *granularity));

        let path = if multiple && *granularity == Granularity::Daily {
            suffixed(&cli.output, "_daily")
        } else {
            cli.output.clone()
        };
        write_output(&path, &report::csv::render(series, *granularity))?;
        println!("CSV saved to: {}", path.display());
    }

    for note in report
        .diagnostics
        .terms
        .iter()
        .filter_map(|t| t.partial_note())
    {
        println!("note: {note}");
    }
    let unbucketable = report.diagnostics.unbucketable();
    if unbucketable > 0 {
        println!("note: {unbucketable} record(s) had no usable publication date");
    }

    if !cli.no_json {
        write_output(&cli.json, &report::json::render(report)?)?;
        println!("Detailed JSON saved to: {}", cli.json.display());
    }

    if !cli.no_chart {
        if let Some((granularity, series)) = report::chart_series(report) {
            report::chart::render(series, granularity, &cli.chart)?;
            println!("Chart saved to: {}", cli.chart.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let prometheus = match &cli.metrics_out {
        Some(_) => Some(mention_tracker::metrics::install_prometheus()?),
        None => None,
    };

    let config = cli.resolve_config()?;
    let cancel = CancelToken::new();
    spawn_cancel_triggers(&cancel, config.run_timeout());

    let engine = Engine::with_substack(config)?;
    let (report, cancelled) = match engine.run(&cancel).await {
        Ok(report) => (report, false),
        Err(RunError::Cancelled(partial)) => (*partial, true),
        Err(e) => return Err(e.into()),
    };

    emit(&cli, &report)?;

    if let (Some(handle), Some(path)) = (&prometheus, &cli.metrics_out) {
        write_output(path, &handle.render())?;
    }

    if cancelled {
        bail!("run cancelled; partial results written");
    }
    Ok(())
}

// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bucket::Granularity;
use crate::error::RunError;
use crate::fetch::backoff::{BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};
use crate::fetch::pacer::DEFAULT_REQUEST_DELAY;
use crate::fetch::providers::substack::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::fetch::types::{ContentFilter, DateRange, SearchFilters, PAGE_CEILING};

pub const ENV_CONFIG_PATH: &str = "MENTION_TRACKER_CONFIG";

/// Upper bounds applied by [`RunConfig::sanitized`].
pub const MAX_REQUEST_DELAY_SECS: f64 = 3600.0;
pub const MAX_BACKOFF_BASE_SECS: f64 = 3600.0;
pub const MAX_RETRIES_CAP: u32 = 10;

fn default_terms() -> Vec<String> {
    vec!["Claude Code".to_string(), "AI coding".to_string()]
}
fn default_max_pages() -> u32 {
    PAGE_CEILING
}
fn default_request_delay_secs() -> f64 {
    DEFAULT_REQUEST_DELAY.as_secs_f64()
}
fn default_backoff_base_secs() -> f64 {
    DEFAULT_BASE_DELAY.as_secs_f64()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_granularities() -> Vec<Granularity> {
    vec![Granularity::Monthly]
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    1
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Everything a run needs. Delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_terms")]
    pub terms: Vec<String>,
    /// Clamped to the endpoint ceiling.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: f64,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_granularities")]
    pub granularities: Vec<Granularity>,
    #[serde(default)]
    pub engagement: bool,
    #[serde(default)]
    pub filter: ContentFilter,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default = "default_true")]
    pub include_platform_results: bool,
    /// Term streams fetched at once; each stream keeps its own pacing.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Whole-run deadline; the run is cancelled when it passes.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            terms: default_terms(),
            max_pages: default_max_pages(),
            request_delay_secs: default_request_delay_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            max_retries: default_max_retries(),
            granularities: default_granularities(),
            engagement: false,
            filter: ContentFilter::All,
            date_range: None,
            include_platform_results: true,
            concurrency: default_concurrency(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            run_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// Load from an explicit path. TOML or JSON by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading run config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: RunConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON config {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("parsing TOML config {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Resolution order:
    /// 1) $MENTION_TRACKER_CONFIG
    /// 2) config/tracker.toml
    /// 3) config/tracker.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/tracker.toml", "config/tracker.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default().sanitized())
    }

    /// Normalize values that would otherwise misbehave at runtime.
    pub fn sanitized(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.terms = self
            .terms
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        self.max_pages = self.max_pages.min(PAGE_CEILING);
        if !self.request_delay_secs.is_finite() || self.request_delay_secs < 0.0 {
            self.request_delay_secs = default_request_delay_secs();
        }
        if !self.backoff_base_secs.is_finite() || self.backoff_base_secs < 0.0 {
            self.backoff_base_secs = default_backoff_base_secs();
        }
        self.request_delay_secs = self.request_delay_secs.min(MAX_REQUEST_DELAY_SECS);
        self.backoff_base_secs = self.backoff_base_secs.min(MAX_BACKOFF_BASE_SECS);
        self.max_retries = self.max_retries.min(MAX_RETRIES_CAP);
        self.concurrency = self.concurrency.max(1);

        let mut grans: Vec<Granularity> = self.granularities.clone();
        grans.sort();
        grans.dedup();
        if grans.is_empty() {
            grans = default_granularities();
        }
        self.granularities = grans;
        self
    }

    /// Reject configurations a run cannot start with. Expects a sanitized
    /// config, so blank terms are already gone.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.terms.is_empty() {
            return Err(RunError::InvalidConfig("no search terms".into()));
        }
        if self.max_pages == 0 {
            return Err(RunError::InvalidConfig("max_pages must be at least 1".into()));
        }
        if self.granularities.is_empty() {
            return Err(RunError::InvalidConfig("no granularity selected".into()));
        }
        Ok(())
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            content: self.filter,
            date_range: self.date_range,
            include_platform_results: self.include_platform_results,
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            secs_to_duration(self.backoff_base_secs, DEFAULT_BASE_DELAY),
            self.max_retries,
        )
    }

    pub fn request_delay(&self) -> Duration {
        secs_to_duration(self.request_delay_secs, DEFAULT_REQUEST_DELAY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

fn secs_to_duration(secs: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_match_endpoint_limits() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.max_pages, 100);
        assert_eq!(cfg.request_delay(), Duration::from_secs(2));
        assert_eq!(cfg.backoff().base, Duration::from_secs(10));
        assert_eq!(cfg.backoff().max_retries, 5);
        assert_eq!(cfg.granularities, vec![Granularity::Monthly]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sanitize_clamps_and_dedups() {
        let cfg = RunConfig {
            terms: vec![" AI coding ".into(), "".into(), "AI coding".into(), "vibe coding".into()],
            max_pages: 500,
            request_delay_secs: f64::NAN,
            backoff_base_secs: -1.0,
            concurrency: 0,
            granularities: vec![Granularity::Monthly, Granularity::Daily, Granularity::Daily],
            ..RunConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.terms, vec!["AI coding".to_string(), "vibe coding".to_string()]);
        assert_eq!(cfg.max_pages, 100);
        assert_eq!(cfg.request_delay_secs, 2.0);
        assert_eq!(cfg.backoff_base_secs, 10.0);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.granularities, vec![Granularity::Daily, Granularity::Monthly]);
    }

    #[test]
    fn sanitize_caps_huge_delays_and_retries() {
        let cfg = RunConfig {
            request_delay_secs: 1.5e19,
            backoff_base_secs: 1e300,
            max_retries: u32::MAX,
            ..RunConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.request_delay(), Duration::from_secs(3600));
        assert_eq!(cfg.backoff().base, Duration::from_secs(3600));
        assert_eq!(cfg.backoff().max_retries, MAX_RETRIES_CAP);
    }

    #[test]
    fn only_blank_terms_leave_nothing_to_run() {
        let cfg = RunConfig {
            terms: vec!["  ".into(), "".into()],
            ..RunConfig::default()
        }
        .sanitized();
        assert!(cfg.terms.is_empty());
        assert!(matches!(cfg.validate(), Err(RunError::InvalidConfig(m)) if m == "no search terms"));
    }

    #[test]
    fn validation_rejects_empty_runs() {
        let cfg = RunConfig {
            terms: vec![],
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RunError::InvalidConfig(_))));

        let cfg = RunConfig {
            max_pages: 0,
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RunError::InvalidConfig(_))));
    }

    #[test]
    fn toml_and_json_files_load() {
        let dir = tempfile::tempdir().unwrap();
        let p_toml = dir.path().join("tracker.toml");
        fs::write(
            &p_toml,
            r#"
terms = ["Claude Code", "vibe coding"]
max_pages = 5
granularities = ["daily"]
engagement = true
filter = "free"
date_range = "month"
"#,
        )
        .unwrap();
        let cfg = RunConfig::load_from(&p_toml).unwrap();
        assert_eq!(cfg.terms.len(), 2);
        assert_eq!(cfg.max_pages, 5);
        assert_eq!(cfg.granularities, vec![Granularity::Daily]);
        assert!(cfg.engagement);
        assert_eq!(cfg.filter, ContentFilter::Free);
        assert_eq!(cfg.date_range, Some(DateRange::Month));
        // untouched fields keep their defaults
        assert_eq!(cfg.request_delay_secs, 2.0);

        let p_json = dir.path().join("tracker.json");
        fs::write(&p_json, r#"{"terms":["x"],"concurrency":3}"#).unwrap();
        let cfg = RunConfig::load_from(&p_json).unwrap();
        assert_eq!(cfg.terms, vec!["x".to_string()]);
        assert_eq!(cfg.concurrency, 3);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // Nothing on disk: built-in defaults.
        let cfg = RunConfig::load_default().unwrap();
        assert_eq!(cfg, RunConfig::default());

        // Fallback file in ./config/
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/tracker.toml"), r#"terms = ["fallback"]"#).unwrap();
        assert_eq!(RunConfig::load_default().unwrap().terms, vec!["fallback".to_string()]);

        // Env var wins.
        let p_env = tmp.path().join("explicit.json");
        fs::write(&p_env, r#"{"terms":["from env"]}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
        assert_eq!(RunConfig::load_default().unwrap().terms, vec!["from env".to_string()]);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(RunConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}

// src/config.rs
//! TOML configuration surface. One immutable `AppConfig` is loaded at
//! startup and handed to each component at construction; nothing reads
//! config ambiently after that.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::Deserialize;

use crate::ingest::types::ContentKind;

pub const DEFAULT_CONFIG_PATH: &str = "config/creator-watch.toml";
pub const ENV_CONFIG_PATH: &str = "CREATOR_WATCH_CONFIG_PATH";

/// One tracked creator and its per-subscription filter settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Allowlist of content kinds; empty means no restriction.
    #[serde(default)]
    pub content_types: Vec<ContentKind>,
    #[serde(default)]
    pub video_only: bool,
}

impl Subscription {
    /// Settings applied to a creator nobody configured: enabled, no
    /// per-subscription filters, so only the global gates apply.
    pub fn unconfigured(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            keywords: Vec::new(),
            content_types: Vec::new(),
            video_only: false,
        }
    }
}

/// Global filter settings shared by every subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub global_keywords: Vec<String>,
    /// Allowlist of subscription names; empty means all subscriptions.
    #[serde(default)]
    pub enabled_sources: Vec<String>,
    #[serde(default)]
    pub exclude_text_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How many cursor pages to walk per run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: default_max_pages(),
            cookies_file: default_cookies_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
            alert_cooldown_secs: default_alert_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 0 means run once and exit.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            state_file: default_state_file(),
            retention_days: default_retention_days(),
            feed: FeedConfig::default(),
            health: HealthConfig::default(),
            filters: FilterConfig::default(),
            subscriptions: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using env var + fallback:
    /// 1) $CREATOR_WATCH_CONFIG_PATH
    /// 2) config/creator-watch.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::seconds(self.health.alert_cooldown_secs.min(i64::MAX as u64) as i64)
    }

    /// Settings for one creator, configured or not.
    pub fn subscription_for(&self, source_name: &str) -> Subscription {
        self.subscriptions
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(source_name))
            .cloned()
            .unwrap_or_else(|| Subscription::unconfigured(source_name))
    }
}

fn default_true() -> bool {
    true
}
fn default_check_interval_secs() -> u64 {
    300
}
fn default_state_file() -> PathBuf {
    PathBuf::from("state/seen_posts.json")
}
fn default_retention_days() -> u32 {
    30
}
fn default_api_base_url() -> String {
    "https://www.patreon.com".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_pages() -> u32 {
    1
}
fn default_cookies_file() -> PathBuf {
    PathBuf::from("cookies/cookies.json")
}
fn default_max_consecutive_failures() -> u32 {
    3
}
fn default_alert_cooldown_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.check_interval_secs, 300);
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.health.max_consecutive_failures, 3);
        assert!(cfg.subscriptions.is_empty());
        assert!(!cfg.filters.exclude_text_only);
    }

    #[test]
    fn full_toml_round_trips_subscriptions() {
        let raw = r#"
            check_interval_secs = 0
            retention_days = 7

            [feed]
            api_base_url = "https://feed.example"
            max_pages = 3

            [health]
            max_consecutive_failures = 5
            alert_cooldown_secs = 600

            [filters]
            global_keywords = ["launch"]
            enabled_sources = ["Ana"]
            exclude_text_only = true

            [[subscriptions]]
            name = "Ana"
            keywords = ["exclusive"]
            content_types = ["video_embed", "image"]

            [[subscriptions]]
            name = "Bela"
            enabled = false
            video_only = true
        "#;
        let cfg: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.check_interval_secs, 0);
        assert_eq!(cfg.feed.max_pages, 3);
        assert_eq!(cfg.health.alert_cooldown_secs, 600);
        assert_eq!(cfg.subscriptions.len(), 2);
        let ana = cfg.subscription_for("ana");
        assert!(ana.enabled);
        assert_eq!(ana.content_types, vec![ContentKind::VideoEmbed, ContentKind::Image]);
        let bela = cfg.subscription_for("Bela");
        assert!(!bela.enabled);
        assert!(bela.video_only);
    }

    #[test]
    fn unknown_creator_gets_passthrough_subscription() {
        let cfg = AppConfig::default();
        let sub = cfg.subscription_for("Nobody");
        assert!(sub.enabled);
        assert!(sub.keywords.is_empty());
        assert!(!sub.video_only);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_over_fallbacks() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("cw.toml");
        std::fs::write(&p, "retention_days = 2").unwrap();
        std::env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.retention_days, 2);
        std::env::remove_var(ENV_CONFIG_PATH);
    }
}

// src/engine.rs
//! Per-run orchestration: prune, fetch, dedup-check, filter, dispatch,
//! mark seen, record health. One run is strictly sequential; continuous
//! mode awaits each run before the next tick, so runs never overlap.
//!
//! Mark policy: an item is marked seen after its dispatch attempt
//! completes, whatever the per-channel outcomes were. A crash mid-run can
//! re-deliver the current batch on restart (at-least-once), it can never
//! lose a notification. Items suppressed by the filter are NOT marked:
//! the filter is deterministic, so they stay suppressed on later runs.
//!
//! Pruning happens at the start of each run, before any processing, so
//! records created within a run are never pruned by the same run.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::filter::should_notify;
use crate::health::{AlertDecision, FailureKind, HealthAlert, HealthMonitor};
use crate::ingest::types::{FeedSource, FetchError, Item};
use crate::notify::{NotificationEvent, NotifierMux};
use crate::state::StateStore;

/// Notification previews keep only the head of a long body.
const MAX_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub notified: usize,
    pub already_seen: usize,
    pub filtered: usize,
    pub pruned: usize,
    pub fetch_failed: bool,
}

pub struct Engine {
    cfg: AppConfig,
    store: StateStore,
    health: HealthMonitor,
    source: Box<dyn FeedSource>,
    channels: NotifierMux,
    alerts: NotifierMux,
}

impl Engine {
    pub fn new(
        cfg: AppConfig,
        store: StateStore,
        source: Box<dyn FeedSource>,
        channels: NotifierMux,
        alerts: NotifierMux,
    ) -> Self {
        let health = HealthMonitor::new(
            cfg.health.max_consecutive_failures,
            cfg.alert_cooldown(),
        );
        Self {
            cfg,
            store,
            health,
            source,
            channels,
            alerts,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub async fn run_once(&mut self) -> RunSummary {
        let now = Utc::now();
        let mut summary = RunSummary {
            pruned: self.store.prune(self.cfg.retention(), now),
            ..RunSummary::default()
        };

        let items = match self.source.fetch_latest().await {
            Ok(items) => {
                self.health.record_success();
                items
            }
            Err(e) => {
                let kind = match &e {
                    FetchError::Auth(_) => FailureKind::Auth,
                    FetchError::Transient(_) => FailureKind::Api,
                };
                warn!(error = %e, "feed fetch failed");
                let decision = self.health.record_failure(kind, &e.to_string(), now);
                self.raise_if_alerting(decision).await;
                summary.fetch_failed = true;
                self.flush_store();
                return summary;
            }
        };
        summary.fetched = items.len();

        for item in &items {
            if self.store.is_seen(&item.id) {
                summary.already_seen += 1;
                continue;
            }

            let sub = self.cfg.subscription_for(&item.source_name);
            if !should_notify(item, &sub, &self.cfg.filters) {
                summary.filtered += 1;
                continue;
            }

            let ev = render_event(item);
            let outcome = self.channels.notify(&ev).await;
            self.store.mark_seen(&item.id, now);
            summary.notified += 1;

            if outcome.all_failed() {
                let detail =
                    format!("all {} channel(s) failed for '{}'", outcome.attempted, ev.title);
                let decision = self
                    .health
                    .record_failure(FailureKind::Delivery, &detail, now);
                self.raise_if_alerting(decision).await;
            }
        }

        self.flush_store();
        info!(
            fetched = summary.fetched,
            notified = summary.notified,
            already_seen = summary.already_seen,
            filtered = summary.filtered,
            pruned = summary.pruned,
            "run complete"
        );
        summary
    }

    /// Tick loop for continuous mode. Never returns under normal
    /// operation.
    pub async fn run_forever(&mut self) {
        let period = std::time::Duration::from_secs(self.cfg.check_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "starting continuous monitoring");
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    async fn raise_if_alerting(&mut self, decision: AlertDecision) {
        if let AlertDecision::ShouldAlert(alert) = decision {
            warn!(
                kind = alert.kind.label(),
                streak = alert.consecutive_failures,
                "raising health alert"
            );
            self.alerts.notify(&render_alert(&alert)).await;
        }
    }

    fn flush_store(&self) {
        if let Err(e) = self.store.flush() {
            error!(error = %e, "could not persist dedup state");
        }
    }
}

fn truncate_preview(s: &str) -> String {
    if s.chars().count() <= MAX_PREVIEW_CHARS {
        return s.to_string();
    }
    let head: String = s.chars().take(MAX_PREVIEW_CHARS - 3).collect();
    format!("{head}...")
}

pub fn render_event(item: &Item) -> NotificationEvent {
    let preview = if item.title.is_empty() {
        &item.body
    } else {
        &item.title
    };
    NotificationEvent {
        title: format!("New post from {}", item.source_name),
        body: truncate_preview(preview),
        url: item.url.clone(),
        thumbnail: item.thumbnail.clone(),
        ts: Utc::now(),
    }
}

fn render_alert(alert: &HealthAlert) -> NotificationEvent {
    NotificationEvent {
        title: alert.title(),
        body: alert.message(),
        url: None,
        thumbnail: None,
        ts: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::ContentKind;

    #[test]
    fn preview_truncates_long_bodies_with_ellipsis() {
        let long = "y".repeat(500);
        let out = truncate_preview(&long);
        assert_eq!(out.chars().count(), MAX_PREVIEW_CHARS);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_preview("short"), "short");
    }

    #[test]
    fn render_event_prefers_title_over_body() {
        let item = Item {
            id: "1".into(),
            source_name: "Ana".into(),
            title: "The title".into(),
            body: "The body".into(),
            content_type: ContentKind::Text,
            embedded_media_urls: vec![],
            url: Some("https://example/p/1".into()),
            thumbnail: None,
            published_at: None,
        };
        let ev = render_event(&item);
        assert_eq!(ev.title, "New post from Ana");
        assert_eq!(ev.body, "The title");
        assert_eq!(ev.url.as_deref(), Some("https://example/p/1"));
    }
}

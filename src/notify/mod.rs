// src/notify/mod.rs
//! Delivery fan-out. Each channel implements `Notifier`; `NotifierMux`
//! sends to every configured channel independently, so one endpoint
//! failing never blocks the others.

pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::notify::discord::DiscordNotifier;
use crate::notify::email::EmailNotifier;
use crate::notify::slack::SlackNotifier;

/// One rendered notification, channel-agnostic.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub ts: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Outcome of one fan-out: how many channels were attempted and how many
/// of those failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub attempted: usize,
    pub failed: usize,
}

impl DispatchOutcome {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Build channels from the main env vars: DISCORD_WEBHOOK_URL,
    /// SLACK_WEBHOOK_URL, SMTP_* (see each channel for its set).
    pub fn from_env() -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(d) = DiscordNotifier::from_env() {
            sinks.push(Box::new(d));
        }
        if let Some(s) = SlackNotifier::from_env() {
            sinks.push(Box::new(s));
        }
        match EmailNotifier::from_env() {
            Ok(Some(e)) => sinks.push(Box::new(e)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "email channel misconfigured, skipping"),
        }
        Self { sinks }
    }

    /// Channels for operator health alerts. HEALTH_-prefixed vars win;
    /// with none set, alerts share the main channels.
    pub fn from_env_health() -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(d) = DiscordNotifier::from_env_prefixed("HEALTH_") {
            sinks.push(Box::new(d));
        }
        if let Some(s) = SlackNotifier::from_env_prefixed("HEALTH_") {
            sinks.push(Box::new(s));
        }
        if sinks.is_empty() {
            return Self::from_env();
        }
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Send to every channel. Failures are logged per channel and
    /// summarized in the outcome; nothing here retries beyond what a
    /// channel does internally.
    pub async fn notify(&self, ev: &NotificationEvent) -> DispatchOutcome {
        let mut failed = 0usize;
        for sink in &self.sinks {
            if let Err(e) = sink.send(ev).await {
                tracing::warn!(channel = sink.name(), error = %e, "delivery failed");
                failed += 1;
            }
        }
        if self.sinks.is_empty() {
            tracing::info!(title = %ev.title, "no channels configured, logging only");
        }
        DispatchOutcome {
            attempted: self.sinks.len(),
            failed,
        }
    }
}

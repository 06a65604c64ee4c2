// src/health.rs
//! Failure-streak tracking with threshold alerts and a cooldown gate.
//!
//! Every failure increments one consecutive counter regardless of kind;
//! any success resets it. Once the streak reaches the configured
//! threshold an alert fires, and the cooldown then gates repeats: a
//! persisting outage re-alerts exactly once per cooldown window. The
//! counter itself is never reset by alerting, only by success.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What failed, so the operator can tell "needs new cookies" apart from
/// "retry later" without reading logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Api,
    Delivery,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Auth => "authentication",
            FailureKind::Api => "feed API",
            FailureKind::Delivery => "notification delivery",
        }
    }

    fn operator_hint(&self) -> &'static str {
        match self {
            FailureKind::Auth => "Check the cookie file and export fresh session cookies.",
            FailureKind::Api => {
                "Likely temporary. If it persists, check the platform's status page."
            }
            FailureKind::Delivery => "Check the notification channel endpoints and credentials.",
        }
    }
}

/// Operator-facing alert payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthAlert {
    pub kind: FailureKind,
    pub consecutive_failures: u32,
    pub detail: String,
}

impl HealthAlert {
    pub fn title(&self) -> String {
        format!("Monitor health: {} failure", self.kind.label())
    }

    pub fn message(&self) -> String {
        format!(
            "{} has failed {} time(s) in a row.\n\nLast error: {}\n\n{}",
            self.kind.label(),
            self.consecutive_failures,
            self.detail,
            self.kind.operator_hint()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    NoAlert,
    ShouldAlert(HealthAlert),
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    max_consecutive_failures: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    last_alert_at: Option<DateTime<Utc>>,
}

impl HealthMonitor {
    pub fn new(max_consecutive_failures: u32, cooldown: Duration) -> Self {
        Self {
            // a threshold of 0 would alert before anything failed
            max_consecutive_failures: max_consecutive_failures.max(1),
            cooldown,
            consecutive_failures: 0,
            last_alert_at: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Any success wipes the streak. No alert side effect.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record one failure and decide whether to alert now.
    pub fn record_failure(
        &mut self,
        kind: FailureKind,
        detail: &str,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures < self.max_consecutive_failures {
            return AlertDecision::NoAlert;
        }
        let cooled_down = match self.last_alert_at {
            None => true,
            Some(last) => now - last >= self.cooldown,
        };
        if !cooled_down {
            return AlertDecision::NoAlert;
        }

        self.last_alert_at = Some(now);
        AlertDecision::ShouldAlert(HealthAlert {
            kind,
            consecutive_failures: self.consecutive_failures,
            detail: detail.to_string(),
        })
    }
}

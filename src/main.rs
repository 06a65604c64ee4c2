//! creator-watch binary entrypoint.
//! Loads configuration and session cookies, wires the feed client,
//! channels and engine, then runs once or continuously.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use creator_watch::auth::CookieJar;
use creator_watch::config::AppConfig;
use creator_watch::engine::Engine;
use creator_watch::ingest::stream_api::StreamApiClient;
use creator_watch::notify::NotifierMux;
use creator_watch::state::StateStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("creator_watch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;
    info!(
        subscriptions = cfg.subscriptions.len(),
        retention_days = cfg.retention_days,
        "configuration loaded"
    );

    let jar = CookieJar::load(&cfg.feed.cookies_file).with_context(|| {
        format!(
            "loading session cookies from {} (export them from your browser \
             with a cookie-editor extension)",
            cfg.feed.cookies_file.display()
        )
    })?;
    info!(cookies = jar.len(), "session cookies loaded");

    let source = StreamApiClient::new(&cfg.feed, &jar).context("building feed client")?;
    let channels = NotifierMux::from_env();
    if channels.is_empty() {
        warn!("no notification channels configured; new posts will only be logged");
    }
    let alerts = NotifierMux::from_env_health();

    let store = StateStore::load(&cfg.state_file);
    info!(tracked = store.len(), "dedup state loaded");

    let continuous = cfg.check_interval_secs > 0;
    let mut engine = Engine::new(cfg, store, Box::new(source), channels, alerts);

    if continuous {
        engine.run_forever().await;
    } else {
        let summary = engine.run_once().await;
        info!(notified = summary.notified, "single run finished");
    }
    Ok(())
}

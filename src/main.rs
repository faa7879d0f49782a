mod answer;
mod api;
mod browser;
mod config;
mod driver;
mod game;
mod interactor;
mod reader;
mod registry;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::browser::{ChromeDriver, ChromeLauncher};
use crate::config::Config;
use crate::registry::SessionRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chromiumoxide::conn=off,chromiumoxide::handler=off")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    tracing::info!(
        "seer starting, listen: {}, site: {}, headless: {}",
        config.listen_addr,
        config.game.site_url,
        config.headless,
    );

    let registry: Arc<SessionRegistry<ChromeDriver>> = Arc::new(SessionRegistry::new());

    let reaper = config.idle_timeout.map(|max_idle| {
        tracing::info!(
            "ending games idle for more than {}s, checking every {}s",
            max_idle.as_secs(),
            config.reap_interval.as_secs(),
        );
        crate::registry::spawn_reaper(registry.clone(), max_idle, config.reap_interval)
    });

    let launcher = Arc::new(ChromeLauncher::new(config.clone()));
    let app = api::router(registry.clone(), launcher, config.game.clone())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .context(format!("failed to bind to {}", config.listen_addr))?;

    tracing::info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    if !registry.is_empty().await {
        tracing::info!("closing {} open game(s)", registry.len().await);
    }
    let closed = registry.shutdown().await;
    tracing::info!("shut down, closed {closed} game(s)");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

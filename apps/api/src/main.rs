mod backend;
mod config;
mod errors;
mod models;
mod routes;
mod screening;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::routes::build_router;
use crate::screening::cache::ResultCache;
use crate::screening::scheduler::{SchedulerSettings, ScreeningContext};
use crate::state::AppState;
use crate::store::{KvStore, MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Session store: Redis when configured, process memory otherwise
    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url, config.session_ttl_secs).await?),
        None => {
            warn!("REDIS_URL not set; cached results will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Scoring backend
    let backend = Arc::new(HttpBackend::new(
        &config.scoring_api_url,
        config.backend_timeout,
    )?);
    info!("Scoring backend: {}", config.scoring_api_url);

    if !config.thresholds.is_default() {
        info!(
            "Tier thresholds overridden: shortlist ≥ {}, waitlist ≥ {}",
            config.thresholds.shortlist, config.thresholds.waitlist
        );
    }

    let screening = ScreeningContext::activate(
        backend,
        ResultCache::new(store),
        SchedulerSettings {
            thresholds: config.thresholds,
            refresh_interval: config.refresh_interval,
        },
    )
    .await;

    // Build router
    let app = build_router(AppState {
        screening: Arc::clone(&screening),
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    screening.deactivate();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

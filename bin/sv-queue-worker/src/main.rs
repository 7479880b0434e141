//! Standalone process draining the Matrix delivery queue (C8).
//!
//! Separate from `sv-alertd` so delivery pacing and Matrix credentials can
//! scale and rotate independently of the sampling/evaluation daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sv_common::MatrixConfig;
use sv_config::AppConfig;
use sv_queue::{HttpMatrixClient, MatrixClient, QueueWorker};
use sv_store::{RedisStore, RoomAliasCache, StateStore};
use tokio::sync::watch;
use tracing::info;

/// On-disk snapshot of the room-alias → room-id cache, relative to the
/// working directory the process is started from.
const ROOM_CACHE_PATH: &str = "sv-queue-worker-state.json";

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "UP", "version": env!("CARGO_PKG_VERSION") }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sv_common::logging::init_logging("sv-queue-worker");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;
    let metrics_port: u16 = env_or_parse("METRICS_PORT", 9091);

    let config = AppConfig::load().context("loading configuration from environment")?;

    let store: Arc<dyn StateStore> = Arc::new(
        RedisStore::connect(&config.redis.url())
            .await
            .context("connecting to redis")?,
    );

    let room_cache = Arc::new(RoomAliasCache::load(ROOM_CACHE_PATH).await);
    let matrix_client: Arc<dyn MatrixClient> =
        Arc::new(HttpMatrixClient::new(reqwest::Client::new(), room_cache));

    let matrix_config = MatrixConfig {
        host: config.matrix.host.clone(),
        user: config.matrix.user.clone(),
        password: config.matrix.password.clone(),
    };
    let delivery_interval = Duration::from_secs(config.queue.delivery_interval_minutes * 60);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = QueueWorker::new(store, matrix_client, matrix_config, delivery_interval, shutdown_rx);

    info!(delivery_interval_minutes = config.queue.delivery_interval_minutes, "queue worker starting");
    let handle = tokio::spawn(worker.run());

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .route("/health", axum::routing::get(health_handler))
        .with_state(metrics_handle);
    let metrics_addr = format!("0.0.0.0:{metrics_port}");
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("binding metrics server to {metrics_addr}"))?;
    info!(addr = %metrics_addr, "metrics server listening");
    let (metrics_shutdown_tx, mut metrics_shutdown_rx) = watch::channel(false);
    let metrics_handle_task = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_router)
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown_rx.changed().await;
            })
            .await
            .ok();
    });

    tokio::signal::ctrl_c()
        .await
        .context("installing ctrl-c handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    let _ = metrics_shutdown_tx.send(true);
    let _ = metrics_handle_task.await;

    info!("queue worker shutdown complete");
    Ok(())
}

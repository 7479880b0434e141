//! CLI entrypoint for the signal deviation alerting daemon.
//!
//! Loads an alerts file, schedules one poll task per alert against the
//! chosen sink, and serves the admin HTTP API alongside it until shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashmap::DashSet;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sv_api::AppState;
use sv_common::{Alert, MatrixAction, MatrixConfig};
use sv_config::AppConfig;
use sv_pipeline::AlertRuntime;
use sv_scheduler::Scheduler;
use sv_signals::{register_builtins, BuiltinConfig, SignalRegistry, TimeSeriesStore};
use sv_sinks::{FileSink, MatrixSink, RedisEnqueuer, Sink, StdoutSink};
use sv_store::{RecordStore, RedisStore, StateStore};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

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

#[derive(Parser)]
#[command(name = "sv-alertd", about = "Signal deviation alerting daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every alert in `file` against the stdout sink
    Stdout {
        #[arg(long)]
        file: PathBuf,
    },
    /// Run every alert in `file` against the file-append sink
    File {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run every alert in `file` against the matrix-via-queue sink, using
    /// the given delivery credentials
    MatrixRoom {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        host: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
    /// Print the built-in signal names and exit
    ListSignals,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sv_common::logging::init_logging("sv-alertd");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;
    let metrics_port: u16 = env_or_parse("METRICS_PORT", 9090);

    let cli = Cli::parse();

    if let Command::ListSignals = cli.command {
        let mut registry = SignalRegistry::new();
        register_builtins(&mut registry, BuiltinConfig::default());
        for name in registry.builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = AppConfig::load().context("loading configuration from environment")?;

    let store: Arc<dyn StateStore> = Arc::new(
        RedisStore::connect(&config.redis.url())
            .await
            .context("connecting to redis")?,
    );

    let mut registry = SignalRegistry::new();
    register_builtins(
        &mut registry,
        BuiltinConfig {
            glassnode_api_key: config.glassnode.api_key.clone(),
        },
    );
    let builtin_names = registry.builtin_names();
    let registry = Arc::new(registry);

    let windows = Arc::new(TimeSeriesStore::new(store.clone()));
    windows
        .hydrate(&builtin_names)
        .await
        .context("hydrating time-series windows from the store")?;

    let alerts: Arc<RecordStore<Alert>> = Arc::new(RecordStore::new(store.clone()));
    let matrix_configs: Arc<RecordStore<MatrixConfig>> = Arc::new(RecordStore::new(store.clone()));
    let matrix_actions: Arc<RecordStore<MatrixAction>> = Arc::new(RecordStore::new(store.clone()));

    let runtime = Arc::new(AlertRuntime::new(
        registry.clone(),
        windows.clone(),
        alerts.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new());

    match cli.command {
        Command::ListSignals => unreachable!("handled above"),
        Command::Stdout { file } => {
            let loaded = sv_config::load_alerts(&file).context("loading alerts file")?;
            persist_alerts(&alerts, &loaded).await?;
            schedule_all(&scheduler, &runtime, Arc::new(StdoutSink), &loaded);
        }
        Command::File { file, out } => {
            let loaded = sv_config::load_alerts(&file).context("loading alerts file")?;
            persist_alerts(&alerts, &loaded).await?;
            schedule_all(&scheduler, &runtime, Arc::new(FileSink::new(out)), &loaded);
        }
        Command::MatrixRoom {
            file,
            host,
            user,
            password,
        } => {
            let loaded = sv_config::load_alerts(&file).context("loading alerts file")?;
            persist_alerts(&alerts, &loaded).await?;

            let matrix_config = MatrixConfig { host, user, password };
            let config_id = matrix_configs
                .put(&matrix_config)
                .await
                .context("persisting matrix config")?;
            for alert in &loaded {
                let action = MatrixAction {
                    alert_id: alert.id.clone(),
                    config_id: config_id.clone(),
                };
                matrix_actions
                    .put(&action)
                    .await
                    .context("persisting matrix action")?;
            }

            let sink: Arc<dyn Sink> = Arc::new(MatrixSink::new(Arc::new(RedisEnqueuer::new(store.clone()))));
            schedule_all(&scheduler, &runtime, sink, &loaded);
        }
    }

    let app_state = AppState {
        registry,
        windows: windows.clone(),
        alerts,
        matrix_configs,
        matrix_actions,
        runtime,
        scheduler: scheduler.clone(),
        store: store.clone(),
        registered: Arc::new(DashSet::new()),
    };
    let router = sv_api::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let bind_addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding admin API to {bind_addr}"))?;
    info!(addr = %bind_addr, "admin API listening");

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .route("/health", axum::routing::get(health_handler))
        .with_state(metrics_handle);
    let metrics_bind_addr = format!("{}:{metrics_port}", config.http.host);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_bind_addr)
        .await
        .with_context(|| format!("binding metrics server to {metrics_bind_addr}"))?;
    info!(addr = %metrics_bind_addr, "metrics server listening");
    let (metrics_shutdown_tx, mut metrics_shutdown_rx) = watch::channel(false);
    let metrics_handle_task = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_router)
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown_rx.changed().await;
            })
            .await
            .ok();
    });

    let (persist_shutdown_tx, mut persist_shutdown_rx) = watch::channel(false);
    let persist_windows = windows.clone();
    let persist_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(60)) => {
                    persist_windows.persist_all().await;
                }
                _ = persist_shutdown_rx.changed() => break,
            }
        }
    });

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(err) = result {
                error!(error = %err, "admin API server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    scheduler.shutdown().await;
    let _ = persist_shutdown_tx.send(true);
    let _ = persist_handle.await;
    windows.persist_all().await;
    let _ = metrics_shutdown_tx.send(true);
    let _ = metrics_handle_task.await;

    info!("sv-alertd shutdown complete");
    Ok(())
}

async fn persist_alerts(alerts: &RecordStore<Alert>, loaded: &[Alert]) -> anyhow::Result<()> {
    info!(count = loaded.len(), "loaded alert definitions");
    for alert in loaded {
        alerts.put(alert).await.context("persisting loaded alert")?;
    }
    Ok(())
}

fn schedule_all(scheduler: &Scheduler, runtime: &Arc<AlertRuntime>, sink: Arc<dyn Sink>, alerts: &[Alert]) {
    for alert in alerts {
        let runtime = runtime.clone();
        let sink = sink.clone();
        let alert_id = alert.id.clone();
        let poll_rate = Duration::from_secs(alert.poll_rate.max(1));
        scheduler.schedule(alert.id.clone(), poll_rate, move || {
            let runtime = runtime.clone();
            let sink = sink.clone();
            let alert_id = alert_id.clone();
            async move { runtime.run_iteration(&alert_id, sink.as_ref()).await }
        });
    }
}


//! Admin HTTP API (C10).
//!
//! A small surface over the record stores and the scheduler: create/read
//! alerts and matrix configs, bind the two together, register a binding so
//! its alert starts polling, and let external signals feed their readings
//! in. Nothing here samples, evaluates, or delivers — that's all
//! [`sv_pipeline::AlertRuntime`], reached only through `register_matrix_action`.

mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashSet;
use serde::Serialize;
use sv_pipeline::AlertRuntime;
use sv_scheduler::Scheduler;
use sv_signals::{SignalRegistry, TimeSeriesStore};
use sv_store::{RecordStore, StateStore};
use sv_common::{Alert, MatrixAction, MatrixConfig};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Shared state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SignalRegistry>,
    pub windows: Arc<TimeSeriesStore>,
    pub alerts: Arc<RecordStore<Alert>>,
    pub matrix_configs: Arc<RecordStore<MatrixConfig>>,
    pub matrix_actions: Arc<RecordStore<MatrixAction>>,
    pub runtime: Arc<AlertRuntime>,
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn StateStore>,
    /// Alert ids with an active scheduled poll task, so a second
    /// registration attempt is rejected rather than double-scheduled.
    pub registered: Arc<DashSet<String>>,
}

/// `{ id }`, returned by every "create" operation. The id is always a
/// content hash: creating the same record twice returns the same id.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Signal Alerting Admin API",
        version = "0.1.0",
        description = "Alert and matrix delivery configuration, plus external signal ingest"
    ),
    paths(
        routes::alerts::create_alert,
        routes::alerts::get_alert,
        routes::matrix::create_matrix_config,
        routes::matrix::get_matrix_config,
        routes::matrix::create_matrix_action,
        routes::matrix::register_matrix_action,
        routes::signals::ingest_reading,
        routes::signals::list_signals,
    ),
    components(schemas(
        CreatedResponse,
        error::ErrorResponse,
        Alert,
        MatrixAction,
        routes::alerts::CreateAlertRequest,
        routes::matrix::CreateMatrixConfigRequest,
        routes::matrix::MatrixConfigResponse,
        routes::matrix::CreateMatrixActionRequest,
        routes::signals::IngestReadingRequest,
        routes::signals::SignalListResponse,
    )),
    tags(
        (name = "alerts", description = "Alert configuration"),
        (name = "matrix", description = "Matrix delivery configuration and registration"),
        (name = "signals", description = "Built-in signal listing and external signal ingest"),
    )
)]
struct ApiDoc;

/// Builds the full admin router, including the Swagger UI mounted at
/// `/swagger-ui`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .route(
            "/alerts",
            post(routes::alerts::create_alert),
        )
        .route("/alerts/:id", get(routes::alerts::get_alert))
        .route(
            "/matrix-configs",
            post(routes::matrix::create_matrix_config),
        )
        .route(
            "/matrix-configs/:id",
            get(routes::matrix::get_matrix_config),
        )
        .route(
            "/matrix-actions",
            post(routes::matrix::create_matrix_action),
        )
        .route(
            "/matrix-actions/:id/register",
            post(routes::matrix::register_matrix_action),
        )
        .route(
            "/signals/:name/readings",
            post(routes::signals::ingest_reading),
        )
        .route("/signals", get(routes::signals::list_signals))
        .with_state(state)
}

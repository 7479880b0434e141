//! External signal ingest and the built-in signal listing.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestReadingRequest {
    pub value: f64,
}

/// Ingest a reading for an external signal
///
/// Rejected for a name that a built-in sampler already owns: a signal is
/// either sampled by the process or fed from outside, never both.
#[utoipa::path(
    post,
    path = "/signals/{name}/readings",
    tag = "signals",
    params(("name" = String, Path, description = "External signal name")),
    request_body = IngestReadingRequest,
    responses(
        (status = 204, description = "Reading recorded"),
        (status = 403, description = "Name belongs to a built-in signal"),
    )
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<IngestReadingRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    if state.registry.is_builtin(&name) {
        return Err(ApiError::Forbidden(format!(
            "{name} is a built-in signal and cannot be ingested externally"
        )));
    }
    state.windows.ingest_external(&name, req.value).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignalListResponse {
    pub builtin: Vec<String>,
}

/// List built-in signal names
#[utoipa::path(
    get,
    path = "/signals",
    tag = "signals",
    responses((status = 200, description = "Built-in signal names", body = SignalListResponse)),
)]
pub async fn list_signals(State(state): State<AppState>) -> Json<SignalListResponse> {
    Json(SignalListResponse {
        builtin: state.registry.builtin_names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state, state_with_registry};
    use async_trait::async_trait;
    use sv_signals::{Sampler, SignalRegistry};

    struct FixedSampler(f64);

    #[async_trait]
    impl Sampler for FixedSampler {
        async fn sample(&self) -> sv_common::Result<f64> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn external_reading_lands_in_the_window() {
        let state = state();
        let status = ingest_reading(
            State(state.clone()),
            Path("custom_metric".to_string()),
            Json(IngestReadingRequest { value: 42.0 }),
        )
        .await
        .unwrap();
        assert_eq!(status, axum::http::StatusCode::NO_CONTENT);

        let window = state.windows.snapshot("custom_metric").await;
        assert_eq!(window.readings.len(), 1);
    }

    #[tokio::test]
    async fn builtin_name_is_forbidden() {
        let mut registry = SignalRegistry::new();
        registry.register("server_load_1m", std::sync::Arc::new(FixedSampler(0.1)));
        let state = state_with_registry(registry);

        let err = ingest_reading(
            State(state),
            Path("server_load_1m".to_string()),
            Json(IngestReadingRequest { value: 1.0 }),
        )
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_signals_reports_registered_builtins() {
        let mut registry = SignalRegistry::new();
        registry.register("btc_price", std::sync::Arc::new(FixedSampler(1.0)));
        let state = state_with_registry(registry);

        let Json(listed) = list_signals(State(state)).await;
        assert_eq!(listed.builtin, vec!["btc_price".to_string()]);
    }
}

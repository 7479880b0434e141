//! Alert CRUD: `POST /alerts` persists a configured alert by content hash,
//! `GET /alerts/{id}` reads it back.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sv_common::{Alert, DeviationCondition, SignalStrategy};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::{AppState, CreatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub struct CreateAlertRequest {
    pub signal: String,
    pub timeframe_secs: u64,
    pub difference: u32,
    pub message: String,
    pub room: Option<String>,
    pub cooloff_secs: Option<u64>,
    pub poll_rate: u64,
    #[serde(default)]
    pub strategy: SignalStrategy,
}

/// Create an alert
#[utoipa::path(
    post,
    path = "/alerts",
    tag = "alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 200, description = "Alert created (or matched an identical existing one)", body = CreatedResponse),
    )
)]
pub async fn create_alert(
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let alert = Alert::new(
        DeviationCondition {
            signal: req.signal,
            timeframe: Duration::from_secs(req.timeframe_secs),
            difference: req.difference,
        },
        req.message,
        req.room,
        req.cooloff_secs.map(Duration::from_secs),
        req.poll_rate,
        req.strategy,
    );
    let id = state.alerts.put(&alert).await?;
    Ok(Json(CreatedResponse { id }))
}

/// Get an alert by id
#[utoipa::path(
    get,
    path = "/alerts/{id}",
    tag = "alerts",
    params(("id" = String, Path, description = "Alert content hash")),
    responses(
        (status = 200, description = "Alert found", body = Alert),
        (status = 404, description = "No alert with that id"),
    )
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    state
        .alerts
        .get(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use axum::extract::State;

    fn sample_request() -> CreateAlertRequest {
        CreateAlertRequest {
            signal: "server_load_1m".to_string(),
            timeframe_secs: 3600,
            difference: 50,
            message: "{{signal}} moved {{diff}}%".to_string(),
            room: None,
            cooloff_secs: None,
            poll_rate: 60,
            strategy: SignalStrategy::OldestNewest,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let state = state();
        let Json(created) = create_alert(State(state.clone()), Json(sample_request()))
            .await
            .unwrap();

        let Json(alert) = get_alert(State(state), Path(created.id.clone())).await.unwrap();
        assert_eq!(alert.id, created.id);
        assert_eq!(alert.condition.signal, "server_load_1m");
    }

    #[tokio::test]
    async fn creating_twice_collapses_onto_the_same_id() {
        let state = state();
        let Json(first) = create_alert(State(state.clone()), Json(sample_request()))
            .await
            .unwrap();
        let Json(second) = create_alert(State(state), Json(sample_request())).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let state = state();
        assert!(get_alert(State(state), Path("nonexistent".to_string()))
            .await
            .is_err());
    }
}

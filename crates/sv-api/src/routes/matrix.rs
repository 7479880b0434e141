//! Matrix config and action admin routes: configuring delivery credentials,
//! binding an alert to them, and registering the bound alert onto the
//! scheduler so it actually starts polling.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sv_common::MatrixConfig;
use sv_sinks::{MatrixSink, RedisEnqueuer};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::{AppState, CreatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMatrixConfigRequest {
    pub host: String,
    pub user: String,
    pub password: String,
}

/// A matrix config as returned to API callers: same fields as
/// [`MatrixConfig`], minus the password.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatrixConfigResponse {
    pub host: String,
    pub user: String,
}

impl From<MatrixConfig> for MatrixConfigResponse {
    fn from(config: MatrixConfig) -> Self {
        Self {
            host: config.host,
            user: config.user,
        }
    }
}

/// Create a matrix delivery config
#[utoipa::path(
    post,
    path = "/matrix-configs",
    tag = "matrix",
    request_body = CreateMatrixConfigRequest,
    responses((status = 200, description = "Config created", body = CreatedResponse)),
)]
pub async fn create_matrix_config(
    State(state): State<AppState>,
    Json(req): Json<CreateMatrixConfigRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let config = MatrixConfig {
        host: req.host,
        user: req.user,
        password: req.password,
    };
    let id = state.matrix_configs.put(&config).await?;
    Ok(Json(CreatedResponse { id }))
}

/// Get a matrix delivery config by id
#[utoipa::path(
    get,
    path = "/matrix-configs/{id}",
    tag = "matrix",
    params(("id" = String, Path, description = "Matrix config content hash")),
    responses(
        (status = 200, description = "Config found", body = MatrixConfigResponse),
        (status = 404, description = "No config with that id"),
    )
)]
pub async fn get_matrix_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatrixConfigResponse>, ApiError> {
    state
        .matrix_configs
        .get(&id)
        .await?
        .map(|config| Json(config.into()))
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMatrixActionRequest {
    pub alert_id: String,
    pub config_id: String,
}

/// Bind an alert to a matrix delivery config
#[utoipa::path(
    post,
    path = "/matrix-actions",
    tag = "matrix",
    request_body = CreateMatrixActionRequest,
    responses(
        (status = 200, description = "Action created", body = CreatedResponse),
        (status = 404, description = "Unknown alert_id or config_id"),
    )
)]
pub async fn create_matrix_action(
    State(state): State<AppState>,
    Json(req): Json<CreateMatrixActionRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    if state.alerts.get(&req.alert_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    if state.matrix_configs.get(&req.config_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    let action = sv_common::MatrixAction {
        alert_id: req.alert_id,
        config_id: req.config_id,
    };
    let id = state.matrix_actions.put(&action).await?;
    Ok(Json(CreatedResponse { id }))
}

/// Register a matrix action, starting its alert's scheduled poll loop
///
/// The matrix config bound to the action is validated to exist (the queue
/// worker that actually delivers to Matrix reads its own credentials at
/// startup), but registration is really about getting the alert onto the
/// scheduler. Re-registering an alert that is already running is a conflict,
/// not a no-op — the caller has to notice and decide.
#[utoipa::path(
    post,
    path = "/matrix-actions/{id}/register",
    tag = "matrix",
    params(("id" = String, Path, description = "Matrix action content hash")),
    responses(
        (status = 200, description = "Alert is now scheduled"),
        (status = 404, description = "Unknown action, alert, or config"),
        (status = 409, description = "Alert already has an active registration"),
    )
)]
pub async fn register_matrix_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    let action = state.matrix_actions.get(&id).await?.ok_or(ApiError::NotFound)?;
    let alert = state
        .alerts
        .get(&action.alert_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if state.matrix_configs.get(&action.config_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    if !state.registered.insert(alert.id.clone()) {
        return Err(ApiError::Conflict(format!(
            "alert {} is already registered",
            alert.id
        )));
    }

    let runtime = state.runtime.clone();
    let sink = Arc::new(MatrixSink::new(Arc::new(RedisEnqueuer::new(
        state.store.clone(),
    ))));
    let alert_id = alert.id.clone();
    let poll_rate = Duration::from_secs(alert.poll_rate.max(1));

    state
        .scheduler
        .schedule(alert.id.clone(), poll_rate, move || {
            let runtime = runtime.clone();
            let sink = sink.clone();
            let alert_id = alert_id.clone();
            async move { runtime.run_iteration(&alert_id, sink.as_ref()).await }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use crate::routes::alerts::{create_alert, CreateAlertRequest};
    use axum::extract::State;
    use sv_common::SignalStrategy;

    fn alert_request() -> CreateAlertRequest {
        CreateAlertRequest {
            signal: "server_load_1m".to_string(),
            timeframe_secs: 3600,
            difference: 50,
            message: "{{signal}}".to_string(),
            room: Some("!ops:example.org".to_string()),
            cooloff_secs: None,
            poll_rate: 60,
            strategy: SignalStrategy::OldestNewest,
        }
    }

    fn config_request() -> CreateMatrixConfigRequest {
        CreateMatrixConfigRequest {
            host: "https://matrix.example.org".to_string(),
            user: "@bot:example.org".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn config_round_trips_without_leaking_the_password() {
        let state = state();
        let Json(created) = create_matrix_config(State(state.clone()), Json(config_request()))
            .await
            .unwrap();
        let Json(config) = get_matrix_config(State(state), Path(created.id)).await.unwrap();
        assert_eq!(config.host, "https://matrix.example.org");
        assert_eq!(
            serde_json::to_value(&config).unwrap().get("password"),
            None
        );
    }

    #[tokio::test]
    async fn action_requires_both_alert_and_config_to_exist() {
        let state = state();
        let err = create_matrix_action(
            State(state),
            Json(CreateMatrixActionRequest {
                alert_id: "nonexistent".to_string(),
                config_id: "nonexistent".to_string(),
            }),
        )
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn register_schedules_once_and_rejects_a_second_attempt() {
        let state = state();
        let Json(alert) = create_alert(State(state.clone()), Json(alert_request()))
            .await
            .unwrap();
        let Json(config) = create_matrix_config(State(state.clone()), Json(config_request()))
            .await
            .unwrap();
        let Json(action) = create_matrix_action(
            State(state.clone()),
            Json(CreateMatrixActionRequest {
                alert_id: alert.id.clone(),
                config_id: config.id.clone(),
            }),
        )
        .await
        .unwrap();

        register_matrix_action(State(state.clone()), Path(action.id.clone()))
            .await
            .unwrap();
        assert!(state.registered.contains(&alert.id));

        let second = register_matrix_action(State(state), Path(action.id)).await;
        assert!(second.is_err());
    }
}

//! HTTP handlers for the REST API

use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, instrument};

use crate::error::Error;
use crate::model::ResyncActions;

use super::dto::{
    ConnectionsResponse, ControllerStatusResponse, ErrorResponse, HealthResponse, ResyncResponse,
};
use super::server::ApiState;

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus text exposition of the controller registry
pub async fn metrics() -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("metrics_failed", &e.to_string())),
        )
    })?;
    Ok(buffer)
}

/// Broker endpoint bound to each Kubernetes context
#[instrument(skip(state))]
pub async fn list_connections(State(state): State<ApiState>) -> Json<ConnectionsResponse> {
    let connections = state.controller.registry().snapshot();
    let total = connections.len();
    Json(ConnectionsResponse { connections, total })
}

#[instrument(skip(state))]
pub async fn controller_status(State(state): State<ApiState>) -> Json<ControllerStatusResponse> {
    let controller = &state.controller;
    Json(ControllerStatusResponse {
        broker: controller.broker().info().await.to_string(),
        event_pump_started: controller.pump_started(),
        meshsync_last_seen: controller.liveness().last_seen(),
    })
}

/// Wipe discovery data and/or ask MeshSync to rediscover
#[instrument(skip(state))]
pub async fn resync(
    State(state): State<ApiState>,
    Json(actions): Json<ResyncActions>,
) -> Result<(StatusCode, Json<ResyncResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state
        .controller
        .resync(&*state.provider, actions)
        .await
    {
        Ok(status) => Ok((StatusCode::ACCEPTED, Json(ResyncResponse { status }))),
        Err(e) => {
            error!("Resync failed: {}", e);
            let code = match e {
                Error::EmptyHandler | Error::BrokerNotConnected | Error::PublishBroker(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((code, Json(ErrorResponse::from(&e))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::controller::test_support::Harness;
    use crate::model::Status;
    use crate::persist::StaticProvider;

    fn state(harness: &Harness) -> ApiState {
        ApiState {
            controller: harness.controller.clone(),
            provider: harness.provider(),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
    }

    #[tokio::test]
    async fn test_connections_reflect_registry() {
        let harness = Harness::new();
        harness.registry.set("c1", "nats://10.0.0.1:4222");

        let Json(body) = list_connections(State(state(&harness))).await;
        assert_eq!(body.total, 1);
        assert_eq!(body.connections["c1"], "nats://10.0.0.1:4222");
    }

    #[tokio::test]
    async fn test_controller_status_before_binding() {
        let harness = Harness::new();
        let Json(body) = controller_status(State(state(&harness))).await;
        assert_eq!(body.broker, "not-connected");
        assert!(!body.event_pump_started);
        assert!(body.meshsync_last_seen.is_none());
    }

    #[tokio::test]
    async fn test_resync_maps_errors() {
        let harness = Harness::new();
        let actions = ResyncActions {
            clear_db: true,
            ..Default::default()
        };

        let (code, Json(body)) = resync(State(state(&harness)), Json(actions)).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(body.status, Status::Processing);

        let empty = ApiState {
            controller: harness.controller.clone(),
            provider: Arc::new(StaticProvider::empty()),
        };
        let (code, Json(body)) = resync(State(empty), Json(actions)).await.unwrap_err();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, Error::EmptyHandler.code());
    }

    #[tokio::test]
    async fn test_metrics_encodes() {
        let body = metrics().await.unwrap();
        assert!(body.contains("# EOF"));
    }
}

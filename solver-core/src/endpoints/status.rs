use axum::debug_handler;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A handler for a simple liveness check
#[debug_handler]
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: SOLVER_VERSION.to_string(),
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// A health check. The gateway has no backing services, so this reports on
/// the gateway alone.
#[debug_handler]
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "gateway": "ok",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_handler() {
        let Json(response) = status_handler().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, SOLVER_VERSION);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let Json(response) = health_handler().await;
        assert_eq!(response, json!({"gateway": "ok"}));
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use toolrental_common::HealthCheckResponse;

use crate::AppState;

/// GET /api/health - public liveness check
async fn health() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        message: "Tool Rental Club API is running".to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    let users = state.provisioning.directory().len().await;
    let body = format!(
        "# HELP toolrental_up Whether the service is up\n\
         # TYPE toolrental_up gauge\n\
         toolrental_up 1\n\
         # HELP toolrental_info Service information\n\
         # TYPE toolrental_info gauge\n\
         toolrental_info{{version=\"{}\"}} 1\n\
         # HELP toolrental_users Provisioned users in the directory\n\
         # TYPE toolrental_users gauge\n\
         toolrental_users {}\n",
        version, users
    );
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .with_state(state)
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{routing::post, Json, Router};
use toolrental_common::{VerifyTokenRequest, VerifyTokenResponse};

use crate::error::ApiError;
use crate::AppState;

/// POST /api/auth/verify - verify a provider token and provision the user
async fn verify_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let Json(request) = payload?;
    if request.token.is_empty() {
        return Err(ApiError::BadRequest("Token is required".to_string()));
    }

    let identity = state.provisioning.resolve(&request.token).await?;

    Ok(Json(VerifyTokenResponse {
        success: true,
        message: "Token verified successfully".to_string(),
        user_id: Some(identity.user.id),
        email: identity.claims.email,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/verify", post(verify_token))
        .with_state(state)
}

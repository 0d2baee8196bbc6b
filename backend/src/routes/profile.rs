use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Extension, Json, Router};
use toolrental_common::{UpdateProfileRequest, UserProfileResponse};

use crate::auth::{require_identity, Claims};
use crate::error::ApiError;
use crate::AppState;

/// GET /api/profile - the authenticated caller's record
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let user = state.provisioning.user_by_id(&claims.subject_id).await?;

    Ok(Json(UserProfileResponse {
        user_id: user.id,
        email: user.email,
        message: Some("This is a protected route".to_string()),
    }))
}

/// PUT /api/profile - change the caller's email
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let Json(request) = payload?;
    let email = request.email.trim().to_string();
    if !email.is_empty() && !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }

    let user = state
        .provisioning
        .change_email(&claims.subject_id, Some(email))
        .await?;

    Ok(Json(UserProfileResponse {
        user_id: user.id,
        email: user.email,
        message: Some("Profile updated".to_string()),
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/profile", get(get_profile).put(update_profile))
        .route_layer(from_fn_with_state(state.clone(), require_identity))
        .with_state(state)
}

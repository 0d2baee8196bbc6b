//! HTTP-facing error type.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use toolrental_common::ErrorResponse;

use crate::auth::{AuthError, VerifyError};
use crate::directory::DirectoryError;
use crate::provisioning::ProvisioningError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::BadRequest("Invalid request payload".to_string())
    }
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        ApiError::Provisioning(e.into())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        ApiError::Provisioning(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Provisioning(ProvisioningError::Verify(e)) => match e {
                VerifyError::InvalidToken(_) | VerifyError::ExpiredToken => StatusCode::UNAUTHORIZED,
                VerifyError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Provisioning(ProvisioningError::Directory(e)) => match e {
                DirectoryError::NotFound => StatusCode::NOT_FOUND,
                DirectoryError::IdConflict(_) | DirectoryError::EmailConflict(_) => StatusCode::CONFLICT,
                DirectoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth(AuthError::MissingHeader) => "missing_authorization",
            ApiError::Auth(AuthError::InvalidFormat) => "invalid_authorization",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Provisioning(e) => e.kind(),
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            ApiError::Provisioning(ProvisioningError::Verify(VerifyError::InvalidToken(_))) => {
                "Invalid token".to_string()
            }
            ApiError::Provisioning(ProvisioningError::Directory(DirectoryError::Storage(_))) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "Request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "Request rejected: {}", self);
        }

        let body = Json(ErrorResponse::new(self.public_message(), self.kind()));
        (status, body).into_response()
    }
}

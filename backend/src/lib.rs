pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod provisioning;
pub mod routes;
pub mod test_util;

pub use auth::{Claims, JwksVerifier, TokenVerifier, UnconfiguredVerifier, VerifyError};
pub use config::Config;
pub use directory::{DirectoryError, InMemoryUserDirectory, UserDirectory};
pub use error::ApiError;
pub use models::user::User;
pub use provisioning::{IdentityProvisioningService, ProvisioningError, ResolvedIdentity};

use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub provisioning: IdentityProvisioningService,
}

/// Build the full HTTP application with all routes and global middleware.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);
    let timeout = state.config.server.request_timeout();

    Router::new()
        .merge(routes::health::router(state.clone()))
        .merge(routes::auth::router(state.clone()))
        .merge(routes::profile::router(state))
        .layer(axum::middleware::from_fn(logging::request_logger))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = match config.origin_list() {
        None => AllowOrigin::from(Any),
        Some(origins) => {
            let values: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {}", o);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

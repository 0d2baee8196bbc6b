//! Tool Rental Club Common Types
//!
//! Wire types shared between the backend API and its browser client.

pub mod auth;
pub mod profile;

pub use auth::{ErrorResponse, VerifyTokenRequest, VerifyTokenResponse};
pub use profile::{HealthCheckResponse, UpdateProfileRequest, UserProfileResponse};

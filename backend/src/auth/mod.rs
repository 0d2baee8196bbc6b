//! Token verification and request authentication.

mod jwks;
mod middleware;
mod verifier;

pub use jwks::JwksVerifier;
pub use middleware::{bearer_token, require_identity, AuthError};
pub use verifier::{Claims, TokenVerifier, UnconfiguredVerifier, VerifyError};

use async_trait::async_trait;
use serde::Serialize;

/// Identity facts extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    /// Stable provider identifier (the `sub` claim)
    pub subject_id: String,
    /// Email, if the provider supplied one
    pub email: Option<String>,
}

impl Claims {
    pub fn new(subject_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl VerifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::InvalidToken(_) => "invalid_token",
            VerifyError::ExpiredToken => "expired_token",
            VerifyError::ProviderUnavailable(_) => "provider_unavailable",
        }
    }
}

/// Capability that turns a raw bearer token into verified claims.
///
/// Implementations may call out to the identity provider. Dropping the
/// returned future cancels the call.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> Result<Claims, VerifyError>;
}

/// Verifier used when no identity provider is configured.
#[derive(Debug, Default)]
pub struct UnconfiguredVerifier;

#[async_trait]
impl TokenVerifier for UnconfiguredVerifier {
    async fn verify(&self, _raw_token: &str) -> Result<Claims, VerifyError> {
        Err(VerifyError::ProviderUnavailable(
            "identity provider not configured".to_string(),
        ))
    }
}

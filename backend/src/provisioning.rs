//! Identity provisioning: verify a token, then find-or-create the local user.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::{Claims, TokenVerifier, VerifyError};
use crate::directory::{DirectoryError, UserDirectory};
use crate::models::user::User;

/// A verified caller together with their local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub claims: Claims,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ProvisioningError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningError::Verify(e) => e.kind(),
            ProvisioningError::Directory(e) => e.kind(),
        }
    }
}

/// Orchestrates token verification and lazy user provisioning.
///
/// `resolve` is not atomic across its lookup and create steps. Two callers
/// for the same new subject can both miss the lookup; the directory lets
/// exactly one create win and the loser re-reads the winner's record.
pub struct IdentityProvisioningService {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn UserDirectory>,
    verify_timeout: Duration,
}

impl IdentityProvisioningService {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        directory: Arc<dyn UserDirectory>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            directory,
            verify_timeout,
        }
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Verify a token without touching the directory.
    pub async fn verify_only(&self, raw_token: &str) -> Result<Claims, ProvisioningError> {
        if raw_token.is_empty() {
            return Err(VerifyError::InvalidToken("empty token".to_string()).into());
        }

        match tokio::time::timeout(self.verify_timeout, self.verifier.verify(raw_token)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(VerifyError::ProviderUnavailable(format!(
                "verification timed out after {}ms",
                self.verify_timeout.as_millis()
            ))
            .into()),
        }
    }

    /// Verify a token and return the caller's user, creating it on first sight.
    pub async fn resolve(&self, raw_token: &str) -> Result<ResolvedIdentity, ProvisioningError> {
        let claims = self.verify_only(raw_token).await?;

        match self.directory.find_by_id(&claims.subject_id).await {
            Ok(user) => {
                tracing::debug!(user_id = %user.id, "Resolved existing user");
                return Ok(ResolvedIdentity { claims, user });
            }
            Err(DirectoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let new_user = User::new(claims.subject_id.clone(), claims.email.clone());
        let create_err = match self.directory.create(new_user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Provisioned new user");
                return Ok(ResolvedIdentity { claims, user });
            }
            Err(e) if e.is_conflict() => e,
            Err(e) => return Err(e.into()),
        };

        // A concurrent request may have provisioned the same subject first.
        match self.directory.find_by_id(&claims.subject_id).await {
            Ok(user) => {
                tracing::debug!(user_id = %user.id, "Lost provisioning race, using existing user");
                Ok(ResolvedIdentity { claims, user })
            }
            Err(_) => {
                tracing::warn!(
                    subject_id = %claims.subject_id,
                    error = %create_err,
                    "User provisioning conflict"
                );
                Err(create_err.into())
            }
        }
    }

    pub async fn user_by_id(&self, id: &str) -> Result<User, ProvisioningError> {
        Ok(self.directory.find_by_id(id).await?)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<User, ProvisioningError> {
        Ok(self.directory.find_by_email(email).await?)
    }

    /// Change a provisioned user's email. An empty email clears it.
    pub async fn change_email(
        &self,
        id: &str,
        email: Option<String>,
    ) -> Result<User, ProvisioningError> {
        let mut user = self.directory.find_by_id(id).await?;
        user.email = email.filter(|e| !e.is_empty());

        let updated = self.directory.update(user).await?;
        tracing::info!(user_id = %updated.id, "Updated user email");
        Ok(updated)
    }
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::verifier::{Claims, TokenVerifier, VerifyError};

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)]
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidcConfig {
    jwks_uri: String,
}

/// ID token claims we read. `iss`, `aud` and `exp` are checked by `Validation`.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Default minimum gap between two JWKS fetches.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    /// Time of the last fetch attempt, successful or not.
    last_refresh: Option<Instant>,
}

/// Verifies RS256 ID tokens against an OIDC provider's published keys.
pub struct JwksVerifier {
    http_client: Client,
    jwks_uri: String,
    cache: RwLock<KeyCache>,
    refresh_cooldown: Duration,
    issuer: String,
    audience: Option<String>,
}

impl JwksVerifier {
    /// Discover the provider's JWKS endpoint and load its keys.
    ///
    /// An empty `audience` disables the audience check.
    pub async fn new(issuer: &str, audience: &str, timeout: Duration) -> Result<Self, VerifyError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::ProviderUnavailable(e.to_string()))?;

        let config_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let config: OidcConfig = http_client
            .get(&config_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::ProviderUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::ProviderUnavailable(e.to_string()))?;

        let verifier = Self {
            http_client,
            jwks_uri: config.jwks_uri,
            cache: RwLock::new(KeyCache::default()),
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            issuer: issuer.to_string(),
            audience: Some(audience.to_string()).filter(|a| !a.is_empty()),
        };

        verifier.refresh_keys().await?;

        Ok(verifier)
    }

    /// Minimum time between refreshes triggered by unknown key IDs.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Re-fetch the key set, replacing the cached keys. Returns the key count.
    pub async fn refresh_keys(&self) -> Result<usize, VerifyError> {
        let mut cache = self.cache.write().await;
        self.refresh_locked(&mut cache).await
    }

    /// Fetch and install keys. An empty key set leaves the cache untouched.
    async fn refresh_locked(&self, cache: &mut KeyCache) -> Result<usize, VerifyError> {
        cache.last_refresh = Some(Instant::now());
        let loaded = self.fetch_keys().await?;

        if loaded.is_empty() {
            tracing::warn!(
                "JWKS from {} has no usable keys, keeping {} cached keys",
                self.jwks_uri,
                cache.keys.len()
            );
            return Err(VerifyError::ProviderUnavailable(
                "JWKS contains no usable keys".to_string(),
            ));
        }

        let count = loaded.len();
        cache.keys = loaded;

        tracing::info!("Loaded {} JWKS keys", count);
        Ok(count)
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, VerifyError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::ProviderUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::ProviderUnavailable(e.to_string()))?;

        let mut loaded = HashMap::new();
        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        loaded.insert(jwk.kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                    }
                }
            }
        }

        Ok(loaded)
    }

    /// Cached key for `kid`, refreshing if the provider may have rotated keys.
    ///
    /// Refreshes run under the write lock, so concurrent misses share one
    /// fetch, and at most one fetch happens per cooldown window.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        if let Some(key) = self.cache.read().await.keys.get(kid) {
            return Ok(key.clone());
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(key) = cache.keys.get(kid) {
            return Ok(key.clone());
        }

        let cooling_down = cache
            .last_refresh
            .is_some_and(|at| at.elapsed() < self.refresh_cooldown);
        if !cooling_down {
            tracing::debug!(kid = %kid, "Unknown signing key, refreshing JWKS");
            self.refresh_locked(&mut cache).await?;
        }

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| VerifyError::InvalidToken(format!("Key not found for kid: {}", kid)))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match self.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, raw_token: &str) -> Result<Claims, VerifyError> {
        if raw_token.is_empty() {
            return Err(VerifyError::InvalidToken("empty token".to_string()));
        }

        let header = decode_header(raw_token).map_err(|e| VerifyError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::InvalidToken("Missing kid in token header".to_string()))?;

        let key = self.key_for(&kid).await?;

        let token_data = decode::<TokenClaims>(raw_token, &key, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::ExpiredToken,
                _ => VerifyError::InvalidToken(e.to_string()),
            }
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(VerifyError::InvalidToken("Missing sub claim".to_string()));
        }

        Ok(Claims::new(token_data.claims.sub, token_data.claims.email))
    }
}

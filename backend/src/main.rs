use std::sync::Arc;

use tokio::net::TcpListener;

use toolrental_backend::{
    app, logging, AppState, Config, IdentityProvisioningService, InMemoryUserDirectory,
    JwksVerifier, TokenVerifier, UnconfiguredVerifier,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().map_err(|e| format!("Failed to load configuration: {}", e))?;

    logging::init(&config.logging.level);
    tracing::info!("Starting Tool Rental Club API");

    // Initialize token verification
    let (verifier, verify_timeout): (Arc<dyn TokenVerifier>, _) = match config.oidc {
        Some(ref oidc) => {
            let verifier =
                JwksVerifier::new(&oidc.issuer, &oidc.audience, oidc.verify_timeout())
                    .await?
                    .with_refresh_cooldown(oidc.jwks_refresh_cooldown());
            tracing::info!("Token verification enabled for issuer {}", oidc.issuer);
            let verifier: Arc<dyn TokenVerifier> = Arc::new(verifier);
            (verifier, oidc.verify_timeout())
        }
        None => {
            tracing::warn!("No identity provider configured. Authentication will not work.");
            let verifier: Arc<dyn TokenVerifier> = Arc::new(UnconfiguredVerifier);
            (verifier, config.server.request_timeout())
        }
    };

    let directory = Arc::new(InMemoryUserDirectory::new());
    let provisioning = IdentityProvisioningService::new(verifier, directory, verify_timeout);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        provisioning,
    });

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

use anyhow::Result;
use authgate::{
    auth::{ClientApp, InMemoryStateStore},
    web, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting authentication gateway");

    // Load configuration from environment (rejects insecure TLS in production)
    let config = authgate::config::Config::load()?;
    tracing::info!(
        environment = ?config.environment,
        gateway_url = %config.gateway_url,
        issuer = %config.oidc_issuer,
        brokered = config.oidc_broker_url.is_some(),
        "Configuration loaded"
    );

    // Discovery failure is fatal: refuse to start without a usable provider
    let state_store = Arc::new(InMemoryStateStore::with_max_entries(
        config.login_state_max_pending,
    ));
    let client_app = ClientApp::with_options(
        config.settings_snapshot(),
        None,
        &config.gateway_url,
        config.client_app_options(),
        state_store.clone(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to initialize OIDC client app: {}", e))?;
    tracing::info!("OIDC client app initialized");

    // Bound memory held by abandoned logins
    let _sweeper = state_store.spawn_sweeper(config.login_state_sweep_interval());

    let state = Arc::new(AppState {
        client_app: Arc::new(client_app),
    });

    let app = web::create_router(state);

    // Bind and serve
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Gateway listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

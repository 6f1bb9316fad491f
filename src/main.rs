use realty_session::config;
use realty_session::devserver::{router, DevServerState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up REALTY_JWT_SECRET, REALTY_SEED_ADMIN_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = config::config();
    tracing::info!("Starting realty dev server in {:?} mode", config.environment);

    let settings = config.devserver.clone();
    if settings.jwt_secret.is_empty() {
        anyhow::bail!("REALTY_JWT_SECRET must be set outside development");
    }

    let bind_addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!(
        require_email_confirmation = settings.require_email_confirmation,
        "realty dev server listening on http://{}",
        bind_addr
    );

    axum::serve(listener, router(DevServerState::new(settings))).await?;
    Ok(())
}

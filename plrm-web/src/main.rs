//! Binário do servidor PLRM.

use std::sync::Arc;

use plrm_web::config::ServerConfig;
use plrm_web::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::from_config(&config));
    let app = plrm_web::app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(suite = %config.suite_name, "servidor PLRM iniciado em http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

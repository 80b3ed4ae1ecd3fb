use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use expression_forge::{
    api,
    config,
    ArchiveBuilder,
    GeminiClient,
    RetryLoop,
    Session,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    config::Config::dotenv_load();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = config::Config::new();
    config::Config::print_env_vars();

    let client = GeminiClient::from_config(&config)?;
    let runner = RetryLoop::new(Arc::new(client), config.retry_policy());
    let state = Arc::new(api::routes::AppState {
        session: Session::new(runner, ArchiveBuilder::new()),
    });
    let app = api::routes::router(state);

    let ip: std::net::IpAddr = config.api_host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", config.api_host);
        std::net::IpAddr::from([127, 0, 0, 1])
    });
    let port: u16 = config.api_port.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_PORT '{}', falling back to 8190", config.api_port);
        8190
    });
    let socket_address = SocketAddr::new(ip, port);
    tracing::info!("listening on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

mod api;
mod events;
mod mint;
mod problem;
mod router;
mod telemetry;
mod wallet;

use std::net::SocketAddr;

use domain_wrap_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let state = router::AppState::from_config(metrics, &config.mint);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        token_id_start = config.mint.token_id_start,
        mint_delay_ms = config.mint.mint_delay.as_millis() as u64,
        failed_mint_ids = config.mint.failed_mint_ids.as_str(),
        display_tz = %config.mint.display_timezone,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

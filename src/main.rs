//! # Picker Proxy Main Entry Point

use picker_proxy::{config::ConfigLoader, server::run_server, telemetry::init_tracing};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(configuration = %redacted_json, "Effective configuration");
    }

    run_server(config).await
}

//! Lightcore example server.

use anyhow::Context;
use lightcore_core::{logging, Config, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(".env").context("failed to read .env")?;
    let server = ServerConfig::from_config(&config)?;
    logging::init(server.log_format);

    let kernel = lightcore_app::kernel(config).context("failed to boot application")?;
    info!(
        version = lightcore_core::VERSION,
        routes = kernel.router().len(),
        "Lightcore booted"
    );

    kernel.serve().await?;
    Ok(())
}

use gridsync::frontend::context::FrontendContext;
use gridsync::frontend::start_all;
use gridsync::logging;
use gridsync::shared::config::CONFIG;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&CONFIG.logging)?;
    info!("gridsync is starting...");

    let ctx = FrontendContext::from_config();
    let servers = tokio::spawn(start_all(Arc::clone(&ctx)));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    ctx.shutdown().await;

    servers.await??;
    info!("gridsync stopped");
    Ok(())
}

pub mod context;
pub mod http;
pub mod server_state;
pub mod ws;

use context::FrontendContext;
use std::sync::Arc;

#[cfg(test)]
mod server_state_test;

pub async fn start_all(ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    tokio::try_join!(
        http::listener::run_http_server(Arc::clone(&ctx)),
        ws::listener::run_ws_server(Arc::clone(&ctx)),
    )?;
    Ok(())
}

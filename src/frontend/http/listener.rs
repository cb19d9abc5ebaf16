use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::frontend::context::FrontendContext;
use crate::shared::config::CONFIG;

use super::handler::handle_request;

const LOG_TARGET: &str = "frontend::http";

pub async fn run_http_server(ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    let addr: SocketAddr = CONFIG.server.http_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(target: LOG_TARGET, "HTTP server running at http://{addr}/api/v1");
    serve_http(listener, ctx).await
}

/// Accepts connections on `listener` until the server starts shutting down.
pub async fn serve_http(listener: TcpListener, ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    loop {
        if ctx.server_state.is_shutting_down() {
            info!(target: LOG_TARGET, "HTTP server shutting down, not accepting new connections");
            break;
        }

        // Use select to make accept cancellable on shutdown
        let accept_result = tokio::select! {
            result = listener.accept() => result,
            _ = async {
                loop {
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                    if ctx.server_state.is_shutting_down() {
                        break;
                    }
                }
            } => {
                info!(target: LOG_TARGET, "HTTP server shutting down, stopping accept loop");
                break;
            }
        };

        let (stream, peer_addr) = match accept_result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(target: LOG_TARGET, error = %e, "Failed to accept HTTP connection");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            let builder = hyper::server::conn::http1::Builder::new();
            if let Err(err) = builder
                .serve_connection(
                    io,
                    service_fn(move |req| handle_request(req, Arc::clone(&ctx))),
                )
                .await
            {
                // Peers hanging up mid-request are routine.
                if err.is_incomplete_message() || err.is_closed() {
                    debug!(target: LOG_TARGET, %peer_addr, error = %err, "Connection closed early");
                } else {
                    warn!(target: LOG_TARGET, %peer_addr, error = %err, "Error serving connection");
                }
            }
        });
    }

    info!(target: LOG_TARGET, "HTTP server shutdown complete");
    Ok(())
}

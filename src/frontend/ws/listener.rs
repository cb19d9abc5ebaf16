use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frontend::context::FrontendContext;
use crate::frontend::http::query_params::parse_query_string;
use crate::realtime::connection::websocket_config;
use crate::shared::config::CONFIG;

const LOG_TARGET: &str = "frontend::ws";

const WS_PATH: &str = "/ws";

pub async fn run_ws_server(ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    let addr: SocketAddr = CONFIG.server.ws_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(target: LOG_TARGET, "WebSocket server running at ws://{addr}{WS_PATH}");
    serve_ws(listener, ctx).await
}

/// Accepts WebSocket upgrades on `listener` until the server starts shutting
/// down. Each connection is served by the realtime hub.
pub async fn serve_ws(listener: TcpListener, ctx: Arc<FrontendContext>) -> anyhow::Result<()> {
    loop {
        if ctx.server_state.is_shutting_down() {
            info!(target: LOG_TARGET, "WebSocket server shutting down, not accepting new connections");
            break;
        }

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
                info!(target: LOG_TARGET, "WebSocket server shutting down, stopping accept loop");
                break;
            }
        };

        let (stream, peer_addr) = match accept_result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(target: LOG_TARGET, error = %e, "Failed to accept WebSocket connection");
                continue;
            }
        };

        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            handle_ws_connection(stream, peer_addr, ctx).await;
        });
    }

    info!(target: LOG_TARGET, "WebSocket server shutdown complete");
    Ok(())
}

/// Reads the optional `tableId` subscription from the upgrade request.
pub fn initial_table(path: &str, query: Option<&str>) -> Result<Option<Uuid>, (StatusCode, String)> {
    if path.trim_end_matches('/') != WS_PATH {
        return Err((StatusCode::NOT_FOUND, "not found".into()));
    }
    let params = parse_query_string(query.unwrap_or(""));
    match params.get("tableId").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid tableId: {raw}"))),
    }
}

async fn handle_ws_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<FrontendContext>) {
    let mut table = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        match initial_table(req.uri().path(), req.uri().query()) {
            Ok(found) => {
                table = found;
                Ok(resp)
            }
            Err((status, message)) => {
                let mut rejection = ErrorResponse::new(Some(message));
                *rejection.status_mut() = status;
                Err(rejection)
            }
        }
    };

    let config = websocket_config(ctx.realtime.settings());
    let socket = match accept_hdr_async_with_config(stream, callback, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(target: LOG_TARGET, %peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    if ctx.realtime.is_shutting_down() {
        return;
    }
    let reason = ctx.realtime.serve(socket, table).await;
    info!(
        target: LOG_TARGET,
        %peer_addr,
        reason = reason.as_str(),
        "WebSocket connection finished"
    );
}

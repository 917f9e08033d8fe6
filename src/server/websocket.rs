//! WebSocket viewer endpoint
//!
//! Each connection registers one receiver and streams every routed packet to
//! the browser as a JSON text frame. Anything the client sends is read and
//! discarded; reading only serves to notice when the client goes away.

use crate::server::receiver::ChannelReceiver;
use crate::server::router::{Router, StatsSnapshot};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct WsState {
    pub router: Arc<Router>,
    /// Packets buffered per viewer before it starts missing some
    pub delivery_buffer: usize,
    /// Ends open sessions on server shutdown
    pub shutdown: CancellationToken,
}

/// Create the HTTP router
pub fn create_router(state: WsState) -> axum::Router {
    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn stats_handler(State(state): State<WsState>) -> Json<StatsSnapshot> {
    Json(state.router.stats())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();

    let (viewer, mut rx) = ChannelReceiver::channel(state.delivery_buffer);
    let receiver_id = state.router.register(viewer.clone());

    info!(receiver_id = %receiver_id, "WebSocket viewer connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if let Err(e) = sender.send(Message::Text(packet.to_json().into())).await {
                warn!(receiver_id = %receiver_id, error = %e, "Delivery error");
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = receiver.next().await {
            match msg_result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(receiver_id = %receiver_id, error = %e, "WebSocket read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut read_task => {}
        _ = state.shutdown.cancelled() => {}
    }

    // The router only learns about this through the liveness probe
    viewer.close();
    send_task.abort();
    read_task.abort();

    debug!(receiver_id = %receiver_id, "WebSocket viewer disconnected");
}

/// Serve the HTTP endpoints until `state.shutdown` fires
pub async fn run_websocket_server(listener: TcpListener, state: WsState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

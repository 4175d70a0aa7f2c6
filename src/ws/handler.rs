//! WebSocket upgrade handler
//!
//! Upgrades `GET /ws` requests and hands the connection to a [`Session`].
//! Origin is not checked; acceptable for a playground service, a real
//! deployment must restrict it.

use std::net::SocketAddr;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{error, info};

use crate::api::server::AppState;
use crate::ws::transport;
use crate::ws::{Session, SessionConfig, MAX_MESSAGE_SIZE};

/// Handler for WebSocket upgrade requests
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let client_id = client_id_for(addr);

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .write_buffer_size(state.config.write_buffer_size)
        .on_failed_upgrade(move |e| error!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, client_id, addr, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, addr: SocketAddr, state: AppState) {
    info!(client_id = %client_id, remote_addr = %addr, "new websocket connection");

    let (sink, stream) = transport::split(socket);
    let session = Session::new(client_id.clone(), SessionConfig::default());
    let handle = session.spawn(stream, sink, state.shutdown.clone());

    handle.closed().await;
    info!(client_id = %client_id, "client disconnected");
}

/// Derive an opaque client identifier from the remote address and the
/// connection time; used only for observability
fn client_id_for(addr: SocketAddr) -> String {
    format!("{}-{}", addr, Utc::now().timestamp())
}

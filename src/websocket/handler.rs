use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::server::AppState;

use super::message::ServerMessage;
use super::session::{Flow, Session};

const CHANNEL_BUFFER_SIZE: usize = 32;

/// WebSocket upgrade handler for the configured chat path.
///
/// Requests to any other path never reach this handler and are rejected
/// by the router without upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
) -> Response {
    tracing::info!(peer = %peer_addr, "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer_addr))
}

/// Run one connection: writer task + inline read loop, one task pair per
/// connection. The registry and the per-connection senders are the only
/// state shared across connections.
async fn handle_socket(socket: WebSocket, state: AppState, peer_addr: SocketAddr) {
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CHANNEL_BUFFER_SIZE);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer task: drain the channel, one text frame per message. Ends
    // when the channel closes or a socket write fails.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender
                .send(Message::Text(msg.to_wire().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let mut session = Session::new(
        state.registry.clone(),
        state.broadcaster.clone(),
        peer_addr,
        tx,
    );
    session.activate().await;

    // Read loop. Every decode outcome is a value; an error closes this
    // session only.
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(msg) => {
                if session.process(msg).await == Flow::Stop {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    session.close().await;
    send_task.abort();

    tracing::info!(peer = %peer_addr, "WebSocket connection closed");
}

//! Connection handle and related types

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// Handle for a single WebSocket connection.
///
/// The handle is the registry's view of a connection: an identity, a
/// write capability, and a liveness flag. The socket itself stays with
/// the per-connection pipeline; writes go through the `sender` channel
/// to the connection's writer task, which preserves send order.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub peer_addr: SocketAddr,
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: DateTime<Utc>,
    open: AtomicBool,
}

impl ConnectionHandle {
    pub fn new(peer_addr: SocketAddr, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            sender,
            connected_at: Utc::now(),
            open: AtomicBool::new(true),
        }
    }

    /// Liveness flag. Cleared by the registry as part of removal, so
    /// membership and liveness never disagree.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Send a message to this connection. Fails, never panics, once the
    /// connection has been closed or its writer task has gone away.
    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        if !self.is_open() {
            return Err(mpsc::error::SendError(message));
        }
        self.sender.send(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40001".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_after_close_fails_silently() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(test_addr(), tx);

        assert!(handle.is_open());
        handle.send(ServerMessage::echo("hi")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().to_wire(), "[me]hi");

        handle.mark_closed();
        assert!(!handle.is_open());
        assert!(handle.send(ServerMessage::echo("late")).await.is_err());
    }
}

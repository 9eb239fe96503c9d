//! Per-connection lifecycle state machine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::broadcast::Broadcaster;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

use super::message::ServerMessage;

/// Session lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// What to do with the connection after one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Drives one connection from handshake completion through active relay
/// to closure.
///
/// Registration and deregistration are explicit transitions here, never
/// a side effect of task teardown, so registry membership always matches
/// the handle's liveness flag. Decode and transport failures arrive as
/// values and map to `close`; nothing unwinds across sessions.
pub struct Session {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    handle: Arc<ConnectionHandle>,
    state: SessionState,
}

impl Session {
    /// A new session is `Connecting`: the handle exists but is not yet a
    /// registry member.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        peer_addr: SocketAddr,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            handle: Arc::new(ConnectionHandle::new(peer_addr, sender)),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// `Connecting -> Active`: join the registry, then announce the join
    /// to all members. Registration comes first, so the joining client
    /// receives its own join notice.
    pub async fn activate(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.registry.insert(self.handle.clone());
        self.state = SessionState::Active;
        self.broadcaster.announce_join(&self.handle).await;
    }

    /// Handle one decoded inbound frame. Text is relayed; binary, ping
    /// and pong carry no application meaning; a close frame stops the
    /// session.
    pub async fn process(&mut self, msg: Message) -> Flow {
        if self.state != SessionState::Active {
            return Flow::Stop;
        }
        match msg {
            Message::Text(text) => {
                self.broadcaster.relay(&self.handle, text.as_str()).await;
                Flow::Continue
            }
            Message::Binary(_) => {
                tracing::debug!(peer = %self.handle.peer_addr, "Ignoring binary frame");
                Flow::Continue
            }
            Message::Ping(_) | Message::Pong(_) => Flow::Continue,
            Message::Close(_) => {
                tracing::debug!(peer = %self.handle.peer_addr, "Received close frame");
                Flow::Stop
            }
        }
    }

    /// `-> Closed`. Idempotent. Closing from `Active` deregisters the
    /// handle and announces the departure to the remaining members; a
    /// session that never activated was never a member, so closing it is
    /// silent.
    pub async fn close(&mut self) {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::Closed;
                self.registry.remove(self.handle.id);
                self.broadcaster.announce_leave(&self.handle).await;
            }
            SessionState::Connecting => {
                self.state = SessionState::Closed;
            }
            SessionState::Closed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> (Arc<ConnectionRegistry>, Arc<Broadcaster>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        (registry, broadcaster)
    }

    fn session(
        registry: &Arc<ConnectionRegistry>,
        broadcaster: &Arc<Broadcaster>,
        port: u16,
    ) -> (Session, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Session::new(
            registry.clone(),
            broadcaster.clone(),
            format!("127.0.0.1:{port}").parse().unwrap(),
            tx,
        );
        (session, rx)
    }

    #[tokio::test]
    async fn test_activate_registers_and_announces() {
        let (registry, broadcaster) = components();
        let (mut session, mut rx) = session(&registry, &broadcaster, 9201);

        assert_eq!(session.state(), SessionState::Connecting);
        assert!(!registry.contains(session.handle().id));

        session.activate().await;
        assert_eq!(session.state(), SessionState::Active);
        assert!(registry.contains(session.handle().id));

        // Add-then-notify: the joiner sees its own join notice.
        let notice = rx.recv().await.unwrap().to_wire();
        assert_eq!(notice, "[server] 127.0.0.1:9201 joined");
    }

    #[tokio::test]
    async fn test_close_deregisters_exactly_once() {
        let (registry, broadcaster) = components();
        let (mut a, _a_rx) = session(&registry, &broadcaster, 9202);
        let (mut b, mut b_rx) = session(&registry, &broadcaster, 9203);
        a.activate().await;
        b.activate().await;
        while b_rx.try_recv().is_ok() {}

        a.close().await;
        a.close().await;

        assert_eq!(a.state(), SessionState::Closed);
        assert!(!registry.contains(a.handle().id));
        assert!(!a.handle().is_open());

        // Exactly one leave notice despite the double close.
        assert_eq!(
            b_rx.try_recv().unwrap().to_wire(),
            "[server] 127.0.0.1:9202 left"
        );
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_before_activation_is_silent() {
        let (registry, broadcaster) = components();
        let (mut witness, mut witness_rx) = session(&registry, &broadcaster, 9204);
        witness.activate().await;
        while witness_rx.try_recv().is_ok() {}

        let (mut never_joined, _rx) = session(&registry, &broadcaster, 9205);
        never_joined.close().await;

        assert_eq!(never_joined.state(), SessionState::Closed);
        assert!(witness_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_frame_stops_the_session() {
        let (registry, broadcaster) = components();
        let (mut session, _rx) = session(&registry, &broadcaster, 9206);
        session.activate().await;

        assert_eq!(
            session.process(Message::Ping(axum::body::Bytes::new())).await,
            Flow::Continue
        );
        assert_eq!(session.process(Message::Close(None)).await, Flow::Stop);
    }
}

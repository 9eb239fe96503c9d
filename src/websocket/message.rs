//! Outbound wire messages.
//!
//! The wire format is plain text, rendered once per recipient on the
//! connection's writer task: `"[<addr>]<text>"` for an attributed chat
//! copy, `"[me]<text>"` for the sender's own echo, and `"[server] ..."`
//! for lifecycle notices.

use std::net::SocketAddr;

/// Marker prefix on a sender's own echoed copy.
pub const SELF_MARKER: &str = "[me]";

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Another member's chat text, attributed to its sender.
    Chat { from: SocketAddr, text: String },
    /// The sender's own copy of a message it sent.
    Echo { text: String },
    /// Lifecycle notice, distinguished from user text by the server tag.
    System(SystemEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    Joined(SocketAddr),
    Left(SocketAddr),
    ShuttingDown,
}

impl ServerMessage {
    pub fn chat(from: SocketAddr, text: impl Into<String>) -> Self {
        Self::Chat {
            from,
            text: text.into(),
        }
    }

    pub fn echo(text: impl Into<String>) -> Self {
        Self::Echo { text: text.into() }
    }

    pub fn joined(addr: SocketAddr) -> Self {
        Self::System(SystemEvent::Joined(addr))
    }

    pub fn left(addr: SocketAddr) -> Self {
        Self::System(SystemEvent::Left(addr))
    }

    /// Render to the text wire format.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Chat { from, text } => format!("[{from}]{text}"),
            Self::Echo { text } => format!("{SELF_MARKER}{text}"),
            Self::System(SystemEvent::Joined(addr)) => format!("[server] {addr} joined"),
            Self::System(SystemEvent::Left(addr)) => format!("[server] {addr} left"),
            Self::System(SystemEvent::ShuttingDown) => "[server] shutting down".to_string(),
        }
    }
}

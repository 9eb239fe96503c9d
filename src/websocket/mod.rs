mod handler;
mod message;
mod session;

pub use handler::ws_handler;
pub use message::{ServerMessage, SystemEvent, SELF_MARKER};
pub use session::{Flow, Session, SessionState};

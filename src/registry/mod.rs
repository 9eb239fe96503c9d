mod connections;
mod stats;
mod types;

pub use connections::ConnectionRegistry;
pub use stats::{PeerInfo, RegistryStats};
pub use types::ConnectionHandle;

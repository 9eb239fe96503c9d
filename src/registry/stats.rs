//! Registry statistics and info structures

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub peers: Vec<PeerInfo>,
}

/// One live connection as reported by the operational API
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub id: Uuid,
    pub addr: String,
    pub connected_at: DateTime<Utc>,
}

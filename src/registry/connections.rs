use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::stats::{PeerInfo, RegistryStats};
use super::types::ConnectionHandle;

/// The single shared set of live connections, keyed by connection id.
///
/// Constructed once by `AppState` and handed to every session by `Arc`,
/// never a global. Add, remove, and snapshot iteration may run
/// concurrently from any number of connection tasks; snapshots hand out
/// owned `Arc`s, so a member removed mid-broadcast can at worst drop a
/// message, never fault a writer.
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Insert a connection. Idempotent by id; returns false if the id
    /// was already a member.
    pub fn insert(&self, handle: Arc<ConnectionHandle>) -> bool {
        let id = handle.id;
        let peer = handle.peer_addr;
        match self.connections.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(handle);
                tracing::info!(connection_id = %id, peer = %peer, "Connection registered");
                true
            }
        }
    }

    /// Remove a connection by id. Idempotent: removing an absent id is a
    /// no-op returning `None`. The handle's liveness flag is cleared
    /// before the entry is handed back, so a write attempted after
    /// removal began sees a closed handle.
    pub fn remove(&self, id: Uuid) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.connections.remove(&id)?;
        handle.mark_closed();
        tracing::info!(connection_id = %id, peer = %handle.peer_addr, "Connection unregistered");
        Some(handle)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Owned snapshot of every member.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Owned snapshot of every member except the given one.
    pub fn snapshot_except(&self, id: Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.connections
            .iter()
            .filter(|r| *r.key() != id)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let peers: Vec<PeerInfo> = self
            .connections
            .iter()
            .map(|r| {
                let handle = r.value();
                PeerInfo {
                    id: handle.id,
                    addr: handle.peer_addr.to_string(),
                    connected_at: handle.connected_at,
                }
            })
            .collect();

        RegistryStats {
            total_connections: peers.len(),
            peers,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::websocket::{ServerMessage, SystemEvent};

/// Maximum number of in-flight sends during fan-out
const MAX_CONCURRENT_SENDS: usize = 64;

/// Below this many recipients, sends run sequentially
const CONCURRENT_SEND_THRESHOLD: usize = 4;

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeliveryReport {
    /// Number of connections the message was delivered to
    pub delivered: usize,
    /// Number of connections that failed to receive
    pub failed: usize,
}

/// Counters for the relay engine
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Total chat messages relayed
    pub messages_relayed: AtomicU64,
    /// Total successful per-connection deliveries
    pub deliveries: AtomicU64,
    /// Total failed per-connection deliveries
    pub failed_deliveries: AtomicU64,
    /// Join notices broadcast
    pub joins: AtomicU64,
    /// Leave notices broadcast
    pub leaves: AtomicU64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            leaves: self.leaves.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of relay statistics
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatsSnapshot {
    pub messages_relayed: u64,
    pub deliveries: u64,
    pub failed_deliveries: u64,
    pub joins: u64,
    pub leaves: u64,
}

/// Fans messages out to the current registry membership.
///
/// A failed send to one recipient is counted and skipped; it never
/// aborts the remaining deliveries or surfaces to the sender. Per-sender
/// ordering holds because a session relays its frames serially and every
/// fan-out pass completes all sends before the session reads the next
/// frame.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    stats: RelayStats,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: RelayStats::default(),
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver `text` from `sender` to every current member: exactly one
    /// write per member, the sender's copy marked as its own echo and
    /// every other copy attributed to the sender's address.
    #[tracing::instrument(
        name = "relay.message",
        skip(self, text),
        fields(sender = %sender.peer_addr, len = text.len())
    )]
    pub async fn relay(&self, sender: &Arc<ConnectionHandle>, text: &str) -> DeliveryReport {
        let mut sends: Vec<(Arc<ConnectionHandle>, ServerMessage)> =
            vec![(sender.clone(), ServerMessage::echo(text))];
        for conn in self.registry.snapshot_except(sender.id) {
            sends.push((conn, ServerMessage::chat(sender.peer_addr, text)));
        }

        let report = self.deliver(sends).await;
        self.stats.messages_relayed.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Relayed message"
        );
        report
    }

    /// Announce a join to all members, the joining connection included.
    pub async fn announce_join(&self, handle: &Arc<ConnectionHandle>) -> DeliveryReport {
        self.stats.joins.fetch_add(1, Ordering::Relaxed);
        tracing::info!(peer = %handle.peer_addr, "Member joined");
        self.announce(ServerMessage::joined(handle.peer_addr)).await
    }

    /// Announce a departure to the remaining members.
    pub async fn announce_leave(&self, handle: &Arc<ConnectionHandle>) -> DeliveryReport {
        self.stats.leaves.fetch_add(1, Ordering::Relaxed);
        tracing::info!(peer = %handle.peer_addr, "Member left");
        self.announce(ServerMessage::left(handle.peer_addr)).await
    }

    /// Shutdown notice to all members, used while draining.
    pub async fn announce_shutdown(&self) -> DeliveryReport {
        self.announce(ServerMessage::System(SystemEvent::ShuttingDown))
            .await
    }

    async fn announce(&self, message: ServerMessage) -> DeliveryReport {
        let sends: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|conn| (conn, message.clone()))
            .collect();
        self.deliver(sends).await
    }

    /// Run the per-recipient sends, sequentially for small memberships
    /// and with bounded concurrency above the threshold.
    async fn deliver(&self, sends: Vec<(Arc<ConnectionHandle>, ServerMessage)>) -> DeliveryReport {
        let mut delivered = 0;
        let mut failed = 0;

        if sends.len() < CONCURRENT_SEND_THRESHOLD {
            for (conn, message) in sends {
                if conn.send(message).await.is_ok() {
                    delivered += 1;
                } else {
                    failed += 1;
                    tracing::debug!(peer = %conn.peer_addr, "Dropping message for closed connection");
                }
            }
        } else {
            let mut pending = sends.into_iter();
            let mut in_flight = FuturesUnordered::new();
            for (conn, message) in pending.by_ref().take(MAX_CONCURRENT_SENDS) {
                in_flight.push(send_one(conn, message));
            }
            while let Some(ok) = in_flight.next().await {
                if ok {
                    delivered += 1;
                } else {
                    failed += 1;
                }
                if let Some((conn, message)) = pending.next() {
                    in_flight.push(send_one(conn, message));
                }
            }
        }

        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .failed_deliveries
            .fetch_add(failed as u64, Ordering::Relaxed);

        DeliveryReport { delivered, failed }
    }
}

fn send_one(conn: Arc<ConnectionHandle>, message: ServerMessage) -> impl Future<Output = bool> {
    async move { conn.send(message).await.is_ok() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = RelayStats::default();
        stats.messages_relayed.fetch_add(3, Ordering::Relaxed);
        stats.deliveries.fetch_add(9, Ordering::Relaxed);
        stats.failed_deliveries.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_relayed, 3);
        assert_eq!(snapshot.deliveries, 9);
        assert_eq!(snapshot.failed_deliveries, 1);
    }

    #[tokio::test]
    async fn test_relay_with_empty_registry_only_echoes() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry);

        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let sender = Arc::new(ConnectionHandle::new("127.0.0.1:9100".parse().unwrap(), tx));

        // The sender still gets its own echo even when nobody else is
        // registered.
        let report = broadcaster.relay(&sender, "alone").await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(rx.recv().await.unwrap().to_wire(), "[me]alone");
    }
}

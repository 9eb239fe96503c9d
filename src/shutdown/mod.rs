//! Graceful shutdown for the relay.
//!
//! On termination the server tells every connected client it is going
//! away, then waits (bounded) for their sessions to drain out of the
//! registry before the process exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::broadcast::Broadcaster;
use crate::config::ShutdownSettings;
use crate::registry::ConnectionRegistry;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for sessions to close after clients are notified
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ShutdownSettings> for ShutdownConfig {
    fn from(settings: &ShutdownSettings) -> Self {
        Self {
            drain_timeout: Duration::from_secs(settings.drain_timeout_secs),
        }
    }
}

/// Handles graceful shutdown of the relay
pub struct GracefulShutdown {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(registry: Arc<ConnectionRegistry>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
            config: ShutdownConfig::default(),
        }
    }

    pub fn with_config(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            config,
        }
    }

    /// Notify all members, then wait for the registry to empty.
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.registry.len())
    )]
    pub async fn execute(&self) -> ShutdownResult {
        let start = std::time::Instant::now();
        let total = self.registry.len();

        tracing::info!(connections = total, "Starting graceful shutdown");
        let report = self.broadcaster.announce_shutdown().await;

        let drained = self.wait_for_drain().await;
        let remaining = self.registry.len();
        if remaining > 0 {
            tracing::warn!(
                remaining_connections = remaining,
                "Some connections did not close before the drain timeout"
            );
        }

        let result = ShutdownResult {
            clients_notified: report.delivered,
            connections_closed: total.saturating_sub(remaining),
            drained,
            duration: start.elapsed(),
        };

        tracing::info!(
            clients_notified = result.clients_notified,
            connections_closed = result.connections_closed,
            drained = result.drained,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }

    async fn wait_for_drain(&self) -> bool {
        if self.registry.is_empty() {
            return true;
        }

        let registry = self.registry.clone();
        let wait = async {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if registry.is_empty() {
                    break;
                }
            }
        };

        timeout(self.config.drain_timeout, wait).await.is_ok()
    }
}

/// Result of a graceful shutdown pass
#[derive(Debug)]
pub struct ShutdownResult {
    /// Number of clients that received the shutdown notice
    pub clients_notified: usize,
    /// Number of connections that closed during the drain window
    pub connections_closed: usize,
    /// Whether the registry emptied before the timeout
    pub drained: bool,
    /// Total time taken
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::registry::ConnectionHandle;

    #[test]
    fn test_config_from_settings() {
        let settings = ShutdownSettings {
            drain_timeout_secs: 3,
        };
        let config = ShutdownConfig::from(&settings);
        assert_eq!(config.drain_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_drain_times_out_when_member_never_closes() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

        let (tx, mut rx) = mpsc::channel(4);
        let handle = Arc::new(ConnectionHandle::new("127.0.0.1:9401".parse().unwrap(), tx));
        registry.insert(handle);

        let shutdown = GracefulShutdown::with_config(
            registry,
            broadcaster,
            ShutdownConfig {
                drain_timeout: Duration::from_millis(200),
            },
        );
        let result = shutdown.execute().await;

        assert!(!result.drained);
        assert_eq!(result.clients_notified, 1);
        assert_eq!(result.connections_closed, 0);
        assert_eq!(
            rx.recv().await.unwrap().to_wire(),
            "[server] shutting down"
        );
    }

    #[tokio::test]
    async fn test_shutdown_no_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let shutdown = GracefulShutdown::new(registry, broadcaster);

        let result = shutdown.execute().await;

        assert!(result.drained);
        assert_eq!(result.clients_notified, 0);
        assert_eq!(result.connections_closed, 0);
    }

    #[test]
    fn test_shutdown_config_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
    }
}

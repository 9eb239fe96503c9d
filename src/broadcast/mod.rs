mod engine;

pub use engine::{Broadcaster, DeliveryReport, RelayStats, RelayStatsSnapshot};

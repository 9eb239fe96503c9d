//! API layer - operational HTTP endpoints.

mod health;
mod routes;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use routes::api_routes;

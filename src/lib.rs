// Infrastructure
pub mod config;
pub mod error;

// Domain
pub mod broadcast;
pub mod registry;

// Application
pub mod api;
pub mod server;
pub mod websocket;

// Supporting modules
pub mod shutdown;

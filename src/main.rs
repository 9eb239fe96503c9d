use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_relay_service::config::Settings;
use chat_relay_service::error::AppError;
use chat_relay_service::server::{create_app, AppState};
use chat_relay_service::shutdown::{GracefulShutdown, ShutdownConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone());
    tracing::info!("Application state initialized");

    // Create Axum app
    let app = create_app(state.clone());

    // Bind the listening socket; failure here is fatal and not retried
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await.map_err(|e| AppError::Bind {
        addr: addr.clone(),
        source: e,
    })?;
    tracing::info!("Server listening on {}", addr);

    // Run server; on shutdown signal, notify clients and drain sessions
    let drain = GracefulShutdown::with_config(
        state.registry.clone(),
        state.broadcaster.clone(),
        ShutdownConfig::from(&settings.shutdown),
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        drain.execute().await;
    })
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

use thiserror::Error;

/// Startup-time failures. These are fatal: the server reports them and
/// does not start. Per-connection failures never become an `AppError`;
/// they are contained within the owning session.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AppError>;

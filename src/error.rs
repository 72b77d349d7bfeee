use thiserror::Error;

/// Main error type for the win-probability and trading service
#[derive(Error, Debug)]
pub enum DiamondError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    // Model errors
    #[error("Invalid base-out state: {0}")]
    InvalidState(String),

    #[error("Invalid American odds: {0}")]
    InvalidOdds(i32),

    #[error("Matrix invariant violated: {0}")]
    Matrix(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Cold-path errors
    #[error("Queue closed: {0}")]
    QueueClosed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Feed error: {0}")]
    Feed(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for DiamondError
pub type Result<T> = std::result::Result<T, DiamondError>;

//! Error types for Fanpost

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, FanpostError>;

#[derive(Error, Debug)]
pub enum FanpostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl FanpostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FanpostError::InvalidInput(_) => 3,
            FanpostError::Platform(PlatformError::Authentication(_)) => 2,
            FanpostError::Config(_) => 2,
            FanpostError::Platform(_)
            | FanpostError::Database(_)
            | FanpostError::NotFound(_)
            | FanpostError::Conflict(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(Platform),

    #[error("No credentials configured for user {0}")]
    CredentialsMissing(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("{platform} timed out after {seconds}s")]
    Timeout { platform: Platform, seconds: u64 },

    #[error("{platform} {phase} failed: {detail}")]
    Phase {
        platform: Platform,
        phase: &'static str,
        detail: String,
    },

    #[error("unsupported platform: {0}")]
    Unsupported(Platform),
}

impl PlatformError {
    /// Map a non-success HTTP status and its error detail to a platform error.
    pub fn from_status(platform: Platform, status: reqwest::StatusCode, detail: &str) -> Self {
        let message = format!("{} API error ({}): {}", platform.display_name(), status.as_u16(), detail);
        match status.as_u16() {
            401 | 403 => PlatformError::Authentication(message),
            429 => PlatformError::RateLimit(message),
            400 | 422 => PlatformError::Validation(message),
            _ => PlatformError::Posting(message),
        }
    }

    /// Map a transport-level failure (DNS, connect, TLS, body read).
    pub fn from_transport(platform: Platform, context: &str, error: reqwest::Error) -> Self {
        PlatformError::Network(format!(
            "{} request failed during {}: {}",
            platform.display_name(),
            context,
            error
        ))
    }
}

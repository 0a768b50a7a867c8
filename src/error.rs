use thiserror::Error;

/// Main error type for the quote sync service
#[derive(Error, Debug)]
pub enum QuoteSyncError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Inbound notification errors
    #[error("Malformed notification: {0}")]
    Decode(String),

    // Capability errors
    #[error("Quote source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Quote store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Event publish failed: {0}")]
    PublishUnavailable(String),

    #[error("Instrument not found: {0}")]
    NotFound(String),

    // Shared resource errors
    #[error("Shared resource '{resource}' is closed")]
    LifecycleClosed { resource: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for QuoteSyncError
pub type Result<T> = std::result::Result<T, QuoteSyncError>;

impl QuoteSyncError {
    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteSyncError::Config(_) | QuoteSyncError::InvalidConfig(_) => "config_error",
            QuoteSyncError::Decode(_) => "decode_error",
            QuoteSyncError::SourceUnavailable(_) => "source_unavailable",
            QuoteSyncError::StoreUnavailable(_) => "store_unavailable",
            QuoteSyncError::PublishUnavailable(_) => "publish_unavailable",
            QuoteSyncError::NotFound(_) => "not_found",
            QuoteSyncError::LifecycleClosed { .. } => "lifecycle_closed",
            QuoteSyncError::Io(_) => "io_error",
        }
    }

    /// Nothing is recovered locally; every error is reported to the caller.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Shared resource was deliberately shut down; only a fresh process can recover.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteSyncError::LifecycleClosed { .. })
    }

    /// Copy of this error with the same kind and message
    ///
    /// Source errors that are not `Clone` are carried over as text.
    pub fn duplicate(&self) -> Self {
        match self {
            QuoteSyncError::Config(e) => QuoteSyncError::InvalidConfig(vec![e.to_string()]),
            QuoteSyncError::InvalidConfig(problems) => {
                QuoteSyncError::InvalidConfig(problems.clone())
            }
            QuoteSyncError::Decode(m) => QuoteSyncError::Decode(m.clone()),
            QuoteSyncError::SourceUnavailable(m) => QuoteSyncError::SourceUnavailable(m.clone()),
            QuoteSyncError::StoreUnavailable(m) => QuoteSyncError::StoreUnavailable(m.clone()),
            QuoteSyncError::PublishUnavailable(m) => QuoteSyncError::PublishUnavailable(m.clone()),
            QuoteSyncError::NotFound(m) => QuoteSyncError::NotFound(m.clone()),
            QuoteSyncError::LifecycleClosed { resource } => QuoteSyncError::LifecycleClosed {
                resource: resource.clone(),
            },
            QuoteSyncError::Io(e) => {
                QuoteSyncError::Io(std::io::Error::new(e.kind(), e.to_string()))
            }
        }
    }
}

impl From<sqlx::Error> for QuoteSyncError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => QuoteSyncError::NotFound("row not found".to_string()),
            other => QuoteSyncError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for QuoteSyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        QuoteSyncError::StoreUnavailable(format!("migration failed: {err}"))
    }
}

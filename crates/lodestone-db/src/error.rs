//! Error types for the key store.
//!
//! Every store operation returns [`DbError`] instead of panicking. Callers
//! treat [`DbError::is_unavailable`] as "not claimed / empty result" and keep
//! the host process running.

/// Errors that can occur in the key store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The SQLite database could not be opened or queried.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Applying the embedded schema migrations failed.
    #[error("store migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied value was rejected before reaching the database.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DbError {
    /// Whether this error means the persistence layer itself is unusable.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Migration(_))
    }
}

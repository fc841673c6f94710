//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type for the startup failures
//! that stop the process. Store failures are not among them: the engine
//! keeps running with generation and reports switched off.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lodestone_core::ConfigError,
    },

    /// Admin API server failed to start.
    #[error("admin error: {source}")]
    Admin {
        /// The underlying server error.
        #[from]
        source: lodestone_admin::ServerError,
    },

    /// Reading host events failed.
    #[error("host event stream error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

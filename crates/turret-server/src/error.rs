//! Error types for the relay binary.

/// Top-level error for the relay binary.
///
/// Each variant wraps a specific subsystem error so `main` can
/// propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: turret_core::ConfigError,
    },

    /// The relay could not be started.
    #[error("startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: turret_relay::StartupError,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}

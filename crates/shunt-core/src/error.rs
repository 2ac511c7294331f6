//! Error types for shunt-core.

use thiserror::Error;

/// Main error type for shunt operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration. Every problem found is reported at once;
    /// a configuration with errors is never partially accepted.
    #[error("invalid configuration:\n{}", format_errors(.errors))]
    Config { errors: Vec<String> },

    /// No usable identity file and no password.
    #[error("unable to locate an identity file from path '{path}'")]
    NoIdentityFile { path: String },

    /// Key decode failure or authentication rejected by the server.
    #[error("authentication error: {message}")]
    Auth { message: String },

    /// A second connect was issued while a run is still in flight.
    #[error("already connected")]
    AlreadyConnected,

    /// Transport or session fault.
    #[error("session error: {message}")]
    Session { message: String },

    /// A live forward could not be built or started.
    #[error("forward error: {message}")]
    Forward { message: String },

    /// Settings file could not be read or written.
    #[error("settings error: {message}")]
    Settings { message: String },

    /// Service registration or control failure.
    #[error("service error: {message}")]
    Service { message: String },
}

fn format_errors(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Build a configuration error from an aggregated list of problems.
    pub fn config(errors: Vec<String>) -> Self {
        Error::Config { errors }
    }

    /// Returns true if this error is a configuration problem the user must
    /// fix before any connection attempt makes sense.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }
}

/// Convenience result type for shunt operations.
pub type Result<T> = std::result::Result<T, Error>;

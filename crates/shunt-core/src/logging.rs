//! Tracing integration for structured logging.
//!
//! Verbosity follows the ssh-like ladder: quiet shows errors only, the
//! default is info, `-v` is debug, `-vv` and beyond is trace.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::Result;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

/// Map the noise flags to a tracing level directive.
pub fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Initialize the logging system.
///
/// `RUST_LOG` overrides the computed filter when set. With a log file the
/// output is appended without ANSI escapes; otherwise it goes to stderr.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
    format: LogFormat,
) -> Result<()> {
    let level = log_level(verbose, quiet);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("shunt={level},shunt_core={level},shunt_client={level}"))
    });

    match (log_file, format) {
        (None, LogFormat::Text) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(verbose >= 1))
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (None, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (Some(path), LogFormat::Text) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(verbose >= 1),
                )
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (Some(path), LogFormat::Json) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(file))
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
    }

    Ok(())
}

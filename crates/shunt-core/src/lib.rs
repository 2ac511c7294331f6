//! shunt-core: Shared library for the shunt tunnel keeper.
//!
//! This crate provides:
//! - Port forward specification parsing
//! - Session collaborator traits and connection state
//! - The coalescing wake signal used by the supervisor
//! - Logging setup
//! - Persisted settings (secrets excluded)

pub mod error;
pub mod forward;
pub mod logging;
pub mod session;
pub mod settings;

pub use error::{Error, Result};
pub use forward::{ForwardDirection, ForwardIntent, ForwardSet};
pub use logging::{LogFormat, init_logging};
pub use session::{ActiveForward, ConnectionState, LogSink, Session, ShellSink};
pub use session::{WakeReason, WakeSignal};
pub use settings::Settings;

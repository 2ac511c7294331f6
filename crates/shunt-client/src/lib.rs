//! shunt-client: the `shunt` binary's library.
//!
//! Provides:
//! - CLI argument parsing
//! - Configuration resolution and validation
//! - Identity file lookup
//! - The russh-backed session
//! - Live port forward handlers
//! - The connection supervisor
//! - systemd service glue

pub mod cli;
pub mod config;
pub mod forward;
pub mod identity;
pub mod service;
pub mod ssh;
pub mod supervisor;

pub use cli::Cli;
pub use config::Config;
pub use identity::{DefaultIdentityLocator, IdentityLocator};
pub use ssh::{RusshSession, SshOptions};
pub use supervisor::Supervisor;

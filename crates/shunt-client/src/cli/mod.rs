//! Client CLI implementation.
//!
//! Provides command-line argument parsing using clap.

pub(crate) mod parsing;
mod types;


pub use types::{Cli, CliLogFormat, ServiceAction};

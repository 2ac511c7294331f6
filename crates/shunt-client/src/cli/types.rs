//! CLI types and struct definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for shunt_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => shunt_core::LogFormat::Text,
            CliLogFormat::Json => shunt_core::LogFormat::Json,
        }
    }
}

/// Service-control operation selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Install,
    Uninstall,
    Start,
    Stop,
}

/// Persistent auto-reconnecting SSH tunnel keeper.
#[derive(Debug, Parser)]
#[command(
    name = "shunt",
    version,
    about = "Keeps an SSH session and its port forwards alive, reconnecting forever"
)]
pub struct Cli {
    /// Remote host (user@host or host)
    pub destination: Option<String>,

    /// Port to connect to on the remote host
    #[arg(short = 'p', long, default_value_t = 22, value_name = "PORT")]
    pub port: u16,

    /// Identity file (private key) for public key authentication.
    /// Defaults to the first of ~/.ssh/id_dsa, id_ecdsa, id_ed25519, id_rsa.
    #[arg(
        short = 'i',
        long = "identity",
        value_name = "identity_file",
        conflicts_with = "password"
    )]
    pub identity_file: Option<PathBuf>,

    /// Password authentication. Not recommended; use an identity file instead.
    #[arg(long, value_name = "PASSWORD", conflicts_with = "identity_file")]
    pub password: Option<String>,

    /// Passphrase for the identity file
    #[arg(long = "key-passphrase", value_name = "PASSPHRASE")]
    pub key_passphrase: Option<String>,

    /// Local port forward: [bind_address:]port:host:hostport
    #[arg(
        short = 'L',
        long = "local",
        action = ArgAction::Append,
        value_name = "[bind_address:]port:host:hostport"
    )]
    pub local_forward: Vec<String>,

    /// Remote port forward: [bind_address:]port:host:hostport
    #[arg(
        short = 'R',
        long = "remote",
        action = ArgAction::Append,
        value_name = "[bind_address:]port:host:hostport"
    )]
    pub remote_forward: Vec<String>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Quiet mode: suppress most diagnostic messages
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text", value_enum)]
    pub log_format: CliLogFormat,

    /// Install shunt as a user service for even more persistency.
    /// All required configuration must be provided in this call.
    #[arg(long = "install-svc", group = "service")]
    pub install_service: bool,

    /// Uninstall the shunt user service
    #[arg(long = "uninstall-svc", group = "service")]
    pub uninstall_service: bool,

    /// Start the shunt user service
    #[arg(long = "start-svc", group = "service")]
    pub start_service: bool,

    /// Stop the shunt user service
    #[arg(long = "stop-svc", group = "service")]
    pub stop_service: bool,

    /// Recover the configuration from a settings file instead of arguments
    /// (used by the installed service)
    #[arg(
        long = "from-settings",
        value_name = "PATH",
        conflicts_with_all = ["destination", "password", "key_passphrase"]
    )]
    pub from_settings: Option<PathBuf>,
}

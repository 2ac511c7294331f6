//! Resolved configuration.
//!
//! `Config::from_cli` is the finalization point: it validates everything at
//! once and parses the forward set eagerly, so the supervisor receives an
//! immutable, fully-checked value. Validation reports the complete list of
//! problems rather than stopping at the first.

use std::path::PathBuf;

use zeroize::Zeroizing;

use shunt_core::{Error, ForwardSet, Result, Settings};

use crate::cli::Cli;
use crate::cli::parsing::split_destination;

/// Fully validated configuration for one supervised connection.
#[derive(Debug)]
pub struct Config {
    destination: String,
    host_name: String,
    user_name: Option<String>,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    password: Option<Zeroizing<String>>,
    key_passphrase: Option<Zeroizing<String>>,
    pub verbose: u8,
    pub quiet: bool,
    forwards: ForwardSet,
}

impl Config {
    /// Finalize the CLI arguments into a configuration.
    ///
    /// Any problem makes the whole configuration invalid; the error carries
    /// every message at once.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut errors = Vec::new();

        let destination = cli.destination.clone().unwrap_or_default();
        let (user_name, host_name) = match cli.destination.as_deref() {
            Some(dest) => {
                let (user, host) = split_destination(dest);
                (user.map(String::from), host.to_string())
            }
            None => {
                errors.push("hostname required option is missing".to_string());
                (None, String::new())
            }
        };

        if cli.service_action().is_some() {
            if cli.password.is_some() {
                errors.push("password cannot be used with service related arguments".to_string());
            }
            if cli.key_passphrase.is_some() {
                errors
                    .push("key-passphrase cannot be used with service related arguments".to_string());
            }
        }

        let forwards = match ForwardSet::parse(&cli.remote_forward, &cli.local_forward) {
            Ok(set) => set,
            Err(parse_errors) => {
                errors.extend(parse_errors);
                ForwardSet::default()
            }
        };

        if !errors.is_empty() {
            return Err(Error::config(errors));
        }

        Ok(Self {
            destination,
            host_name,
            user_name,
            port: cli.port,
            identity_file: cli.identity_file.clone(),
            password: cli.password.clone().map(Zeroizing::new),
            key_passphrase: cli.key_passphrase.clone().map(Zeroizing::new),
            verbose: cli.verbose,
            quiet: cli.quiet,
            forwards,
        })
    }

    /// Recover a configuration from persisted settings.
    ///
    /// Secrets cannot arrive this way; the service path authenticates with
    /// an identity file only.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let (user, host) = split_destination(&settings.destination);
        if host.is_empty() {
            return Err(Error::config(vec![
                "hostname required option is missing".to_string(),
            ]));
        }

        let forwards = ForwardSet::parse(&settings.remote_forwards, &settings.local_forwards)
            .map_err(Error::config)?;

        Ok(Self {
            host_name: host.to_string(),
            user_name: user.map(String::from),
            destination: settings.destination,
            port: settings.port,
            identity_file: settings.identity_file,
            password: None,
            key_passphrase: None,
            verbose: settings.verbose,
            quiet: settings.quiet,
            forwards,
        })
    }

    /// The non-secret view of this configuration, for persistence.
    pub fn to_settings(&self) -> Settings {
        Settings {
            destination: self.destination.clone(),
            port: self.port,
            identity_file: self.identity_file.clone(),
            remote_forwards: self
                .forwards
                .iter()
                .filter(|i| i.direction() == shunt_core::ForwardDirection::Remote)
                .map(render_spec)
                .collect(),
            local_forwards: self
                .forwards
                .iter()
                .filter(|i| i.direction() == shunt_core::ForwardDirection::Local)
                .map(render_spec)
                .collect(),
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn forwards(&self) -> &ForwardSet {
        &self.forwards
    }

    /// Move the password out. The backing memory is zeroized on drop, and a
    /// second call returns `None`.
    pub fn take_password(&mut self) -> Option<Zeroizing<String>> {
        self.password.take()
    }

    /// Move the key passphrase out, same contract as [`Self::take_password`].
    pub fn take_key_passphrase(&mut self) -> Option<Zeroizing<String>> {
        self.key_passphrase.take()
    }
}

/// Render an intent back to `[bind_address:]port:host:hostport` form.
fn render_spec(intent: &shunt_core::ForwardIntent) -> String {
    if intent.bound_host().is_empty() {
        format!(
            "{}:{}:{}",
            intent.bound_port(),
            intent.target_host(),
            intent.target_port()
        )
    } else {
        format!(
            "{}:{}:{}:{}",
            intent.bound_host(),
            intent.bound_port(),
            intent.target_host(),
            intent.target_port()
        )
    }
}

//! shunt binary entry point.
//!
//! Persistent auto-reconnecting SSH tunnel keeper.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use shunt_client::cli::{Cli, ServiceAction};
use shunt_client::identity::{DefaultIdentityLocator, IdentityLocator};
use shunt_client::ssh::{RusshSession, SshAuth, SshOptions};
use shunt_client::{service, Config, Supervisor};
use shunt_core::{init_logging, Error, LogSink, Result, Settings};

const UNHANDLED_FAULT_CODE: i32 = 1;
// clap uses 2 for its own parse errors; configuration errors match it.
const INVALID_ARGS_CODE: i32 = 2;
const NO_IDENTITY_FILE_CODE: i32 = 3;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(
        cli.verbose,
        cli.quiet,
        cli.log_file.as_deref(),
        cli.log_format.into(),
    ) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(UNHANDLED_FAULT_CODE);
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e @ Error::Config { .. }) => {
            eprintln!("shunt: {e}");
            eprintln!("Usage: shunt [options] [user@]host");
            eprintln!("       shunt <--install-svc|--uninstall-svc|--start-svc|--stop-svc> [options] [user@]host");
            INVALID_ARGS_CODE
        }
        Err(e @ Error::NoIdentityFile { .. }) => {
            error!("{e}");
            NO_IDENTITY_FILE_CODE
        }
        Err(e) => {
            error!(error = %e, "Unexpected failure");
            UNHANDLED_FAULT_CODE
        }
    };

    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    if let Some(action) = cli.service_action() {
        let config = if action == ServiceAction::Install {
            Some(Config::from_cli(&cli)?)
        } else {
            None
        };
        return service::dispatch(action, config.as_ref());
    }

    let config = match cli.from_settings.as_deref() {
        Some(path) => Config::from_settings(Settings::load(path)?)?,
        None => Config::from_cli(&cli)?,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_client(config))
}

async fn run_client(mut config: Config) -> Result<()> {
    let auth = resolve_auth(&mut config)?;

    let user = config
        .user_name()
        .map(String::from)
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .unwrap_or_else(|| "root".to_string());

    info!(
        host = config.host_name(),
        user = %user,
        port = config.port,
        forwards = config.forwards().len(),
        "Starting"
    );

    let options = SshOptions::new(config.host_name().to_string(), config.port, user, auth);
    let session = RusshSession::new(options);
    let supervisor = Supervisor::new(session, config.forwards().clone(), Arc::new(LogSink));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, disconnecting");
                cancel.cancel();
            }
        });
    }

    supervisor.connect(cancel).await
}

/// Pick the credential: a non-empty password wins, otherwise an identity
/// file is located and loaded. Secrets are moved out of the configuration
/// here and zeroized once used.
fn resolve_auth(config: &mut Config) -> Result<SshAuth> {
    if let Some(password) = config.take_password() {
        if !password.is_empty() {
            warn!("Using password to connect, against better advice...");
            return Ok(SshAuth::Password(password));
        }
    }

    let passphrase = config.take_key_passphrase();
    let key = DefaultIdentityLocator::new().locate(
        config.identity_file.as_deref(),
        passphrase.as_deref().map(String::as_str),
    )?;
    Ok(SshAuth::Key(Arc::new(key)))
}

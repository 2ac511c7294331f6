//! systemd user-service glue.
//!
//! Installing writes the validated settings (secrets excluded) plus a user
//! unit whose ExecStart re-enters this binary with `--from-settings`, so the
//! service recovers the same target host and forwarding set without CLI
//! arguments. Start/stop/uninstall shell out to `systemctl --user`.

use std::path::PathBuf;
use std::process::Command;

use tracing::{info, warn};

use shunt_core::{Error, Result, Settings};

use crate::cli::ServiceAction;
use crate::config::Config;

const SERVICE_NAME: &str = "shunt";

/// Run one service-control operation. `Install` is the only one that needs
/// a full configuration.
pub fn dispatch(action: ServiceAction, config: Option<&Config>) -> Result<()> {
    match action {
        ServiceAction::Install => {
            let config = config.ok_or_else(|| Error::Service {
                message: "install requires a full configuration".into(),
            })?;
            install(config)
        }
        ServiceAction::Uninstall => uninstall(),
        ServiceAction::Start => systemctl(&["start", &unit_name()]),
        ServiceAction::Stop => systemctl(&["stop", &unit_name()]),
    }
}

fn install(config: &Config) -> Result<()> {
    let settings_path = Settings::default_path()?;
    config.to_settings().store(&settings_path)?;
    info!(path = %settings_path.display(), "Settings saved");

    let exe = std::env::current_exe()?;
    let unit = render_unit(&exe.display().to_string(), &settings_path.display().to_string());

    let unit_path = user_unit_path()?;
    if let Some(parent) = unit_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&unit_path, unit)?;
    info!(path = %unit_path.display(), "Service unit installed");

    systemctl(&["daemon-reload"])
}

fn uninstall() -> Result<()> {
    // Best effort: the unit may not be running or even enabled.
    if systemctl(&["stop", &unit_name()]).is_err() {
        warn!("Service was not running");
    }
    if systemctl(&["disable", &unit_name()]).is_err() {
        warn!("Service was not enabled");
    }

    let unit_path = user_unit_path()?;
    if unit_path.exists() {
        std::fs::remove_file(&unit_path)?;
        info!(path = %unit_path.display(), "Service unit removed");
    }

    systemctl(&["daemon-reload"])
}

fn unit_name() -> String {
    format!("{SERVICE_NAME}.service")
}

fn user_unit_path() -> Result<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or_else(|| Error::Service {
            message: "neither XDG_CONFIG_HOME nor HOME is set".into(),
        })?;
    Ok(config_dir.join("systemd").join("user").join(unit_name()))
}

fn render_unit(exe: &str, settings_path: &str) -> String {
    format!(
        "[Unit]\n\
         Description=shunt persistent SSH tunnel\n\
         After=network-online.target\n\
         \n\
         [Service]\n\
         ExecStart={exe} --from-settings {settings_path}\n\
         Restart=always\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n"
    )
}

fn systemctl(args: &[&str]) -> Result<()> {
    let status = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .status()
        .map_err(|e| Error::Service {
            message: format!("unable to run systemctl: {e}"),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Service {
            message: format!("systemctl --user {} failed with {status}", args.join(" ")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_references_exe_and_settings() {
        let unit = render_unit("/usr/local/bin/shunt", "/home/u/.config/shunt/settings.json");
        assert!(unit.contains(
            "ExecStart=/usr/local/bin/shunt --from-settings /home/u/.config/shunt/settings.json"
        ));
        assert!(unit.contains("Restart=always"));
        assert!(unit.starts_with("[Unit]"));
    }

    #[test]
    fn unit_name_is_stable() {
        assert_eq!(unit_name(), "shunt.service");
    }
}

//! Persisted settings.
//!
//! A service instantiation recovers the target host and forwarding set from
//! this file instead of re-parsing CLI arguments. Secrets never land here:
//! the type simply has no password or passphrase fields, so the password and
//! key passphrase can only arrive through the live flow.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Resolved, non-secret configuration persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Destination as given on the command line (`[user@]host`).
    pub destination: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    /// Raw `-R` entries; re-parsed on load (the parser is pure, so the
    /// recovered set is identical).
    #[serde(default)]
    pub remote_forwards: Vec<String>,
    /// Raw `-L` entries.
    #[serde(default)]
    pub local_forwards: Vec<String>,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default)]
    pub quiet: bool,
}

impl Settings {
    /// Default on-disk location: `$XDG_CONFIG_HOME`/`~/.config` under `shunt/`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok_or_else(|| Error::Settings {
                message: "neither XDG_CONFIG_HOME nor HOME is set".into(),
            })?;
        Ok(config_dir.join("shunt").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::Settings {
            message: format!("unable to read '{}': {e}", path.display()),
        })?;
        serde_json::from_str(&data).map_err(|e| Error::Settings {
            message: format!("unable to parse '{}': {e}", path.display()),
        })
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|e| Error::Settings {
            message: format!("unable to serialize settings: {e}"),
        })?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

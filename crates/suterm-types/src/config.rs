//! Engine configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SutermError};

/// Where the engine looks for things and how long it waits for them.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Install location checked first for the helper script.
    pub primary_script: PathBuf,
    /// Install location checked when the primary is absent.
    pub fallback_script: PathBuf,
    /// Directory whose presence `status` reports.
    pub superuser_dir: PathBuf,
    /// Shell interpreter for non-elevated commands (`<shell> -c <line>`).
    pub shell: String,
    /// Privilege escalation wrapper (`<su> -c <line>`).
    pub su_binary: String,
    /// Timeout for non-elevated commands; 0 disables it. Elevated commands
    /// never time out.
    pub shell_timeout_secs: u64,
    /// Working directory of a fresh session.
    pub initial_directory: String,
    /// Answer pwd/ls/cat/mkdir/echo/date/whoami/uname/history/ps in-process.
    pub local_shell: bool,
    /// Helper script to install at `fallback_script` when neither
    /// location exists during `initialize`.
    pub helper_asset: Option<PathBuf>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            primary_script: PathBuf::from("/data/superuser/bin/Superuser_main"),
            fallback_script: PathBuf::from("/data/local/tmp/Superuser_main"),
            superuser_dir: PathBuf::from("/data/superuser"),
            shell: default_shell(),
            su_binary: "su".to_string(),
            shell_timeout_secs: 10,
            initial_directory: default_initial_directory(),
            local_shell: false,
            helper_asset: None,
        }
    }
}

/// `/system/bin/sh` on Android, `/bin/sh` everywhere else.
pub fn default_shell() -> String {
    if Path::new("/system/bin/sh").exists() {
        "/system/bin/sh".to_string()
    } else {
        "/bin/sh".to_string()
    }
}

fn default_initial_directory() -> String {
    if Path::new("/data").is_dir() {
        "/data".to_string()
    } else {
        "/".to_string()
    }
}

impl TerminalConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SutermError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| SutermError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

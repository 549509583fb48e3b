//! Configuration file management.
//!
//! Provides a TOML-based config file at `~/.config/tasker/config.toml` and a
//! resolution chain: per-request field > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default primer command: prints nothing and exits immediately, in both
/// POSIX shells and cmd.exe.
pub const DEFAULT_PRIMER_COMMAND: &str = "cd .";

/// Engine defaults a [`crate::RunRequest`] falls back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskerConfig {
    /// Command for the pseudo task run before the real one. Empty disables
    /// priming.
    pub primer_command: String,
    /// Strip surrounding whitespace from captured output.
    pub trim_output: bool,
    /// Output timeout in milliseconds; 0 disables it.
    pub output_timeout_ms: u64,
}

impl Default for TaskerConfig {
    fn default() -> Self {
        Self {
            primer_command: DEFAULT_PRIMER_COMMAND.to_string(),
            trim_output: true,
            output_timeout_ms: 0,
        }
    }
}

impl TaskerConfig {
    /// Resolve the effective config: env vars over the config file over
    /// built-in defaults. A missing or unreadable file falls back to
    /// defaults; a malformed env var is logged and ignored.
    pub fn resolve() -> Self {
        Self::apply_env(load_config().unwrap_or_default())
    }

    /// Apply the `TASKER_*` env var overrides to a base config.
    fn apply_env(mut config: Self) -> Self {
        if let Ok(value) = std::env::var("TASKER_PRIMER_COMMAND") {
            config.primer_command = value;
        }
        if let Ok(value) = std::env::var("TASKER_TRIM_OUTPUT") {
            match value.parse() {
                Ok(flag) => config.trim_output = flag,
                Err(_) => tracing::warn!(value, "ignoring non-boolean TASKER_TRIM_OUTPUT"),
            }
        }
        if let Ok(value) = std::env::var("TASKER_OUTPUT_TIMEOUT_MS") {
            match value.parse() {
                Ok(ms) => config.output_timeout_ms = ms,
                Err(_) => tracing::warn!(value, "ignoring non-numeric TASKER_OUTPUT_TIMEOUT_MS"),
            }
        }

        config
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the tasker config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/tasker` or `~/.config/tasker`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tasker");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tasker")
}

/// Return the path to the tasker config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<TaskerConfig> {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Result<TaskerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: TaskerConfig =
        toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &TaskerConfig) -> Result<()> {
    save_config_to(&config_path(), config)
}

fn save_config_to(path: &Path, config: &TaskerConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

//! Shared config-directory helpers for the relay service
//!
//! All relay state (credentials file, SQLite database) lives under a
//! single per-user directory, `~/.config/relay/`. The binary calls
//! [`init`] once at startup; everything else resolves paths inside that
//! directory or loads JSON from it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Directory name under the platform config root.
const APP_DIR: &str = "relay";

/// Bootstrap the relay config directory, creating it if needed.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// The relay config directory (`~/.config/relay/` on Linux), or None
/// when the platform config root cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|root| root.join(APP_DIR))
}

/// Path of `filename` inside the relay config directory.
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(filename))
}

/// Whether `filename` exists in the relay config directory.
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|path| path.exists())
}

/// Create the relay config directory if it does not exist yet.
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("could not determine the config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("could not create config directory {}", dir.display()))?;
    Ok(dir)
}

/// Load and parse a JSON file from the relay config directory.
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("could not determine the config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path.
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("could not parse {}", path.display()))
}

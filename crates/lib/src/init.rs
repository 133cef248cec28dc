//! Initialize the configuration directory: create ~/.relay, a default config, and a starter messages file.
//!
//! Defaults mirror `crates/lib/config/`: `config.json` and `messages.txt` land beside each other.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG: &str = include_str!("../config/config.json");
static DEFAULT_MESSAGES: &str = include_str!("../config/messages.txt");

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` from the bundled template if missing.
/// - Writes `messages.txt` beside it if missing.
///
/// Existing files are never overwritten. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    let messages = config_dir.join("messages.txt");
    if !messages.exists() {
        std::fs::write(&messages, DEFAULT_MESSAGES)
            .with_context(|| format!("writing default messages to {}", messages.display()))?;
        log::info!("wrote default messages to {}", messages.display());
    }

    Ok(config_dir.to_path_buf())
}

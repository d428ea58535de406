//! Locating and reading the config file.

use crate::defaults::DEFAULT_CONFIG_FILE;
use crate::schema::QuickZipConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Resolve the config file to load.
/// Priority: `QUICKZIP_CONFIG` env > `./quickzip.yaml` > `<config dir>/quickzip/config.yaml`.
/// When none exist the local name is returned and loading yields defaults.
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("QUICKZIP_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("quickzip").join("config.yaml");
        if user.exists() {
            return user;
        }
    }
    local
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<QuickZipConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(QuickZipConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text. An empty document is an empty config.
pub fn parse_config(raw: &str) -> Result<QuickZipConfig> {
    if raw.trim().is_empty() {
        return Ok(QuickZipConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

//! Environment overrides applied after the file is loaded.
//!
//! | Variable           | Field                  |
//! |--------------------|------------------------|
//! | `BOT_TOKEN`        | `telegram.botToken`    |
//! | `ADMIN_ID`         | `telegram.adminId`     |
//! | `CONC_MAX`         | `fetch.concurrency`    |
//! | `QUICKZIP_STORAGE` | `storage.root`         |
//! | `QUICKZIP_DB`      | `database.path`        |
//! | `RUST_LOG`         | `logging.level`        |

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::schema::{
    DatabaseConfig, FetchConfig, LoggingConfig, QuickZipConfig, StorageConfig, TelegramConfig,
};

pub fn apply_env_overrides(config: QuickZipConfig) -> QuickZipConfig {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

pub fn apply_env_overrides_with(
    mut config: QuickZipConfig,
    env: &HashMap<String, String>,
) -> QuickZipConfig {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(token) = get("BOT_TOKEN") {
        config
            .telegram
            .get_or_insert_with(TelegramConfig::default)
            .bot_token = Some(token.to_string());
    }
    if let Some(admin) = get("ADMIN_ID").and_then(|v| parse("ADMIN_ID", v)) {
        config
            .telegram
            .get_or_insert_with(TelegramConfig::default)
            .admin_id = Some(admin);
    }
    if let Some(conc) = get("CONC_MAX").and_then(|v| parse("CONC_MAX", v)) {
        config.fetch.get_or_insert_with(FetchConfig::default).concurrency = Some(conc);
    }
    if let Some(root) = get("QUICKZIP_STORAGE") {
        config.storage.get_or_insert_with(StorageConfig::default).root = Some(PathBuf::from(root));
    }
    if let Some(db) = get("QUICKZIP_DB") {
        config.database.get_or_insert_with(DatabaseConfig::default).path = Some(PathBuf::from(db));
    }
    if let Some(level) = get("RUST_LOG") {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level.to_string());
    }
    config
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = key, value = raw, "Ignoring unparseable environment override");
            None
        }
    }
}

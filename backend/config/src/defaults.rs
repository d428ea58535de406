//! Config defaults: fill every unset field so the effective config can be
//! printed and validated as a whole.

use crate::schema::{
    DatabaseConfig, FetchConfig, LoggingConfig, QuickZipConfig, StorageConfig, TasksConfig,
};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "quickzip.yaml";
pub const DEFAULT_STORAGE_ROOT: &str = "./files";
pub const DEFAULT_DATABASE_PATH: &str = "./data/quickzip.sqlite";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_GROUP_RADIUS: i32 = 10;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Largest total payload one task may collect.
pub const DEFAULT_MAX_TASK_BYTES: u64 = 2_000_000_000;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: QuickZipConfig) -> QuickZipConfig {
    let config = apply_storage_defaults(config);
    let config = apply_fetch_defaults(config);
    let config = apply_task_defaults(config);
    apply_logging_defaults(config)
}

fn apply_storage_defaults(mut config: QuickZipConfig) -> QuickZipConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    storage
        .root
        .get_or_insert_with(|| PathBuf::from(DEFAULT_STORAGE_ROOT));

    let database = config.database.get_or_insert_with(DatabaseConfig::default);
    database
        .path
        .get_or_insert_with(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    config
}

fn apply_fetch_defaults(mut config: QuickZipConfig) -> QuickZipConfig {
    let fetch = config.fetch.get_or_insert_with(FetchConfig::default);
    fetch.concurrency.get_or_insert(DEFAULT_CONCURRENCY);
    fetch.group_radius.get_or_insert(DEFAULT_GROUP_RADIUS);
    config
}

fn apply_task_defaults(mut config: QuickZipConfig) -> QuickZipConfig {
    let tasks = config.tasks.get_or_insert_with(TasksConfig::default);
    tasks.timeout_secs.get_or_insert(DEFAULT_TASK_TIMEOUT_SECS);
    tasks.sweep_interval_secs.get_or_insert(DEFAULT_SWEEP_INTERVAL_SECS);
    tasks.max_task_bytes.get_or_insert(DEFAULT_MAX_TASK_BYTES);
    config
}

fn apply_logging_defaults(mut config: QuickZipConfig) -> QuickZipConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.dir.get_or_insert_with(|| PathBuf::from(DEFAULT_LOG_DIR));
    logging.json.get_or_insert(false);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let config = apply_all_defaults(QuickZipConfig::default());
        assert_eq!(config.fetch.as_ref().unwrap().concurrency, Some(3));
        assert_eq!(config.tasks.as_ref().unwrap().timeout_secs, Some(3600));
        assert_eq!(config.logging.as_ref().unwrap().level.as_deref(), Some("info"));
        assert!(config.telegram.is_none());
    }

    #[test]
    fn keeps_explicit_values() {
        let mut config = QuickZipConfig::default();
        config.fetch = Some(FetchConfig {
            concurrency: Some(8),
            group_radius: None,
        });
        let config = apply_all_defaults(config);
        let fetch = config.fetch.unwrap();
        assert_eq!(fetch.concurrency, Some(8));
        assert_eq!(fetch.group_radius, Some(10));
    }
}

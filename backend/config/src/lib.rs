//! `quickzip-config`: runtime configuration.
//!
//! Provides:
//! - Typed config schema
//! - YAML loading
//! - `${ENV_VAR}` substitution and environment overrides
//! - Default value application
//! - Validation and redacted display

pub mod defaults;
pub mod env;
pub mod io;
pub mod overrides;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_file_path, load_config, parse_config};
pub use overrides::{apply_env_overrides, apply_env_overrides_with};
pub use redact::redact;
pub use schema::QuickZipConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a config file, substitute `${VAR}` references, apply environment
/// overrides and defaults, then validate. Findings are logged and returned;
/// the caller decides whether errors are fatal.
pub async fn load_and_prepare(path: &Path) -> Result<(QuickZipConfig, ValidationReport)> {
    let raw_config = load_config(path).await?;

    let value: Value = serde_json::to_value(&raw_config)
        .context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: QuickZipConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(apply_env_overrides(config));

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok((config, report))
}

/// Effective config as YAML with secrets masked.
pub fn display_redacted(config: &QuickZipConfig) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    serde_yaml::to_string(&redact(&value)).context("Failed to render config")
}

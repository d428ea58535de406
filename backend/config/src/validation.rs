//! Config validation with field paths in every finding.

use crate::defaults::DEFAULT_MAX_TASK_BYTES;
use crate::schema::QuickZipConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors stop the bot from starting; warnings are only logged.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &QuickZipConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_telegram(config, &mut report);
    validate_fetch(config, &mut report);
    validate_tasks(config, &mut report);
    report
}

fn validate_telegram(config: &QuickZipConfig, report: &mut ValidationReport) {
    match config.bot_token() {
        None => report.error("telegram.botToken", "Telegram bot token is required (or set BOT_TOKEN)"),
        Some(token) if !token.contains(':') => {
            report.error("telegram.botToken", "Token must look like <bot id>:<secret>")
        }
        Some(_) => {}
    }
    if config.admin_id().is_none() {
        report.warn("telegram.adminId", "No admin configured; /approve and /disapprove are disabled");
    }
}

fn validate_fetch(config: &QuickZipConfig, report: &mut ValidationReport) {
    let concurrency = config.concurrency();
    if concurrency == 0 {
        report.error("fetch.concurrency", "Concurrency must be at least 1");
    } else if concurrency > 16 {
        report.warn(
            "fetch.concurrency",
            format!("{concurrency} parallel downloads will likely hit Telegram flood limits"),
        );
    }

    let radius = config.group_radius();
    if radius < 1 {
        report.error("fetch.groupRadius", "Radius must be at least 1 or albums cannot be expanded");
    } else if radius < 10 {
        report.warn(
            "fetch.groupRadius",
            "Albums hold up to 10 items; a radius below 10 can miss members",
        );
    }
}

fn validate_tasks(config: &QuickZipConfig, report: &mut ValidationReport) {
    if config.task_timeout().is_zero() {
        report.error("tasks.timeoutSecs", "Timeout must be greater than zero");
    }
    if config.sweep_interval().is_zero() {
        report.error("tasks.sweepIntervalSecs", "Sweep interval must be greater than zero");
    } else if config.sweep_interval() > config.task_timeout() {
        report.warn(
            "tasks.sweepIntervalSecs",
            "Sweep interval is longer than the task timeout; idle tasks will outlive it",
        );
    }

    let max = config.max_task_bytes();
    if max == 0 {
        report.error("tasks.maxTaskBytes", "Size ceiling must be greater than zero");
    } else if max > DEFAULT_MAX_TASK_BYTES {
        report.error(
            "tasks.maxTaskBytes",
            format!("Size ceiling cannot exceed {DEFAULT_MAX_TASK_BYTES} bytes (Telegram upload limit)"),
        );
    }
}

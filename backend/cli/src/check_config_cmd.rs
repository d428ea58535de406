//! `quickzip check-config`: show what `serve` would run with.

use std::path::Path;

use anyhow::{bail, Result};
use quickzip_config::{display_redacted, load_and_prepare};

use crate::terminal_output::{note_error, note_info, note_success, note_warn, render_table};

pub async fn run(path: &Path) -> Result<()> {
    if path.exists() {
        note_info(&format!("Config file: {}", path.display()));
    } else {
        note_warn(&format!("{} not found; using defaults and environment", path.display()));
    }

    let (config, report) = load_and_prepare(path).await?;
    println!("\n{}", display_redacted(&config)?);

    let rows: Vec<Vec<String>> = report
        .errors
        .iter()
        .map(|e| vec!["error".to_string(), e.path.clone(), e.message.clone()])
        .chain(
            report
                .warnings
                .iter()
                .map(|w| vec!["warning".to_string(), w.path.clone(), w.message.clone()]),
        )
        .collect();
    if !rows.is_empty() {
        print!("{}", render_table(&["Level", "Path", "Message"], &rows));
        println!();
    }

    if report.is_valid() {
        note_success("Configuration is valid");
        Ok(())
    } else {
        note_error(&format!("{} error(s) must be fixed before `serve`", report.errors.len()));
        bail!("invalid configuration")
    }
}

/// User-facing reply texts.
use quickzip_core::{ArchiveError, QuickZipError, MAX_TASK_BYTES};
use quickzip_logging::redact_sensitive_data;

use crate::service::{ExtractReport, FinalizeReport};

pub const WELCOME: &str = "Hi! I pack the files you send me into a zip archive.\n\
Use /add to start, send me some files, then /zip <name> to get them back as one archive.";
pub const BEGIN: &str = "OK, send me some files.";
pub const BEGIN_REPLACED: &str = "Started over. The previous file list was discarded. Send me some files.";
pub const OVER_LIMIT: &str = "Adding this file will exceed the 2 GB limit. Please send smaller files.";
pub const NO_TASK: &str = "You must use /add first.";
pub const EMPTY_TASK: &str = "You must send me some files first.";
pub const TOTAL_TOO_LARGE: &str = "Total file size must not exceed 2.0 GB.";
pub const BUSY: &str = "Your archive is still being built. Use /cancel to stop it.";
pub const CANCELLED: &str = "Canceled zip. For a new one, use /add.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
pub const ZIP_USAGE: &str = "Usage: /zip <name>, using only letters, digits and underscores.";
pub const UNZIP_USAGE: &str = "Reply to a .zip or .rar file with /unzip.";
pub const UNSUPPORTED_ARCHIVE: &str = "I can only extract .zip and .rar archives.";
pub const NOT_APPROVED: &str = "This chat is not approved to use the bot. Ask the admin to run /approve here.";
pub const ADMIN_ONLY: &str = "Only the admin can do that.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see what I can do.";
pub const NOTHING_FETCHED: &str = "None of the files could be downloaded.";

pub fn error(e: &QuickZipError) -> String {
    format!("An error occurred: {}", redact_sensitive_data(&e.to_string()))
}

/// Reply for a failed finalize or extract.
pub fn for_error(e: &QuickZipError) -> String {
    match e {
        QuickZipError::NoTask => NO_TASK.to_string(),
        QuickZipError::EmptyTask => EMPTY_TASK.to_string(),
        QuickZipError::Busy => BUSY.to_string(),
        QuickZipError::Cancelled => CANCELLED.to_string(),
        QuickZipError::Admission(r) if r.limit == MAX_TASK_BYTES => TOTAL_TOO_LARGE.to_string(),
        QuickZipError::Admission(r) => {
            format!("Total file size must not exceed {}.", human_bytes(r.limit))
        }
        QuickZipError::Archive(ArchiveError::UnsupportedFormat(_)) => UNSUPPORTED_ARCHIVE.to_string(),
        other => error(other),
    }
}

pub fn listing(files: &[quickzip_tasks::ListedFile]) -> String {
    if files.is_empty() {
        return "No files yet. Send me some.".to_string();
    }
    let mut lines = vec![format!("{} file(s) so far:", files.len())];
    for (i, f) in files.iter().enumerate() {
        match &f.content_type {
            Some(ct) => lines.push(format!("{}. {} ({})", i + 1, f.name, ct)),
            None => lines.push(format!("{}. {}", i + 1, f.name)),
        }
    }
    lines.join("\n")
}

/// Summary sent after the archive; empty when there is nothing to report.
pub fn finalize_summary(report: &FinalizeReport) -> String {
    if !report.uploaded {
        return NOTHING_FETCHED.to_string();
    }
    let mut lines = Vec::new();
    if !report.omitted.is_empty() {
        lines.push(format!(
            "{} file(s) could not be downloaded and are missing from {}:",
            report.omitted.len(),
            report.archive_name
        ));
        for member in &report.omitted {
            lines.push(format!("- {}", member.name));
        }
    }
    if !report.truncated_groups.is_empty() {
        lines.push("Some albums were very large; a few of their files may be missing.".to_string());
    }
    lines.join("\n")
}

pub fn extract_summary(report: &ExtractReport) -> String {
    if report.failed.is_empty() {
        return format!("Sent {} file(s) from {}.", report.delivered, report.archive_name);
    }
    let mut lines = vec![format!(
        "Sent {} file(s) from {}. These could not be sent:",
        report.delivered, report.archive_name
    )];
    for member in &report.failed {
        lines.push(format!("- {}", member.name));
    }
    lines.join("\n")
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickzip_core::{Rejection, TransferError};
    use quickzip_media::OmittedMember;

    #[test]
    fn ceiling_rejection_uses_the_fixed_text() {
        let e = QuickZipError::Admission(Rejection {
            committed: MAX_TASK_BYTES,
            candidate: 1,
            limit: MAX_TASK_BYTES,
        });
        assert_eq!(for_error(&e), TOTAL_TOO_LARGE);
    }

    #[test]
    fn error_text_is_redacted() {
        let e = QuickZipError::Config(
            "GET https://api.telegram.org/bot123456:ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghij/getFile".into(),
        );
        let text = for_error(&e);
        assert!(text.starts_with("An error occurred:"));
        assert!(!text.contains("ABCDEFGHIJ"));
    }

    #[test]
    fn summary_lists_omitted_files() {
        let report = FinalizeReport {
            archive_name: "x.zip".into(),
            archived: 1,
            omitted: vec![OmittedMember {
                name: "gone.pdf".into(),
                message_id: 4,
                error: TransferError::RemoteGone("deleted".into()),
            }],
            truncated_groups: vec![],
            uploaded: true,
        };
        let text = finalize_summary(&report);
        assert!(text.contains("x.zip"));
        assert!(text.contains("- gone.pdf"));
    }

    #[test]
    fn clean_run_has_no_summary() {
        let report = FinalizeReport {
            archive_name: "x.zip".into(),
            archived: 2,
            omitted: vec![],
            truncated_groups: vec![],
            uploaded: true,
        };
        assert!(finalize_summary(&report).is_empty());
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2_000_000_000), "2.0 GB");
        assert_eq!(human_bytes(1_500_000), "1.5 MB");
    }
}

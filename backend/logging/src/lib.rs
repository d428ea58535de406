//! Structured logging for the bot.
//!
//! Console and rolling NDJSON output, secret redaction, and the task
//! lifecycle event log.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{TaskEvent, TaskEventEntry, TaskEventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;

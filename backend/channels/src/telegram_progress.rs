//! Telegram Progress Reporter
//!
//! Renders transfer progress as a status message that is edited in place and
//! deleted once the transfer ends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quickzip_core::{Direction, Progress, ProgressObserver, ProgressReceiver, SessionId};
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::rate_limiter::ChatRateLimiter;

/// Minimum gap between two edits of one status message.
pub const EDIT_INTERVAL: Duration = Duration::from_secs(10);

const BAR_CELLS: usize = 20;

/// Where status messages go. Implemented for [`Bot`]; tests use a recorder.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn send(&self, chat: SessionId, text: String) -> anyhow::Result<i32>;
    async fn edit(&self, chat: SessionId, message: i32, text: String) -> anyhow::Result<()>;
    async fn delete(&self, chat: SessionId, message: i32) -> anyhow::Result<()>;
}

#[async_trait]
impl StatusSink for Bot {
    async fn send(&self, chat: SessionId, text: String) -> anyhow::Result<i32> {
        let sent = self.send_message(ChatId(chat.0), text).await?;
        Ok(sent.id.0)
    }

    async fn edit(&self, chat: SessionId, message: i32, text: String) -> anyhow::Result<()> {
        self.edit_message_text(ChatId(chat.0), MessageId(message), text)
            .await?;
        Ok(())
    }

    async fn delete(&self, chat: SessionId, message: i32) -> anyhow::Result<()> {
        self.delete_message(ChatId(chat.0), MessageId(message)).await?;
        Ok(())
    }
}

/// `■■■■□□□…` bar with megabyte counts.
pub fn render_progress(direction: Direction, name: &str, progress: Progress) -> String {
    let filled = ((progress.percent() / 100.0) * BAR_CELLS as f64).floor() as usize;
    let filled = filled.min(BAR_CELLS);
    let bar = format!("{}{}", "■".repeat(filled), "□".repeat(BAR_CELLS - filled));
    let verb = match direction {
        Direction::Download => "Downloading",
        Direction::Upload => "Uploading",
    };
    format!(
        "{verb} {name}\n{bar} {:.1}%\n{:.1} MB / {:.1} MB",
        progress.percent(),
        progress.transferred as f64 / 1_000_000.0,
        progress.total as f64 / 1_000_000.0,
    )
}

/// [`ProgressObserver`] that gives every transfer its own status message.
#[derive(Clone)]
pub struct TelegramProgressReporter {
    sink: Arc<dyn StatusSink>,
    limiter: ChatRateLimiter,
    interval: Duration,
}

impl TelegramProgressReporter {
    pub fn new(sink: Arc<dyn StatusSink>, limiter: ChatRateLimiter) -> Self {
        Self {
            sink,
            limiter,
            interval: EDIT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl ProgressObserver for TelegramProgressReporter {
    fn observe(&self, session: SessionId, direction: Direction, name: &str, progress: ProgressReceiver) {
        let reporter = self.clone();
        let name = name.to_string();
        tokio::spawn(async move { reporter.report(session, direction, name, progress).await });
    }
}

impl TelegramProgressReporter {
    async fn report(
        &self,
        chat: SessionId,
        direction: Direction,
        name: String,
        mut progress: ProgressReceiver,
    ) {
        let mut status: Option<i32> = None;
        let mut last_edit: Option<Instant> = None;

        loop {
            let ended = progress.changed().await.is_err();
            let current = *progress.borrow_and_update();
            if ended || current.is_complete() {
                break;
            }
            if last_edit.is_some_and(|at| at.elapsed() < self.interval) {
                continue;
            }
            if !self.limiter.check(chat).await.allowed {
                continue;
            }
            let text = render_progress(direction, &name, current);
            match status {
                None => match self.sink.send(chat, text).await {
                    Ok(id) => status = Some(id),
                    Err(e) => warn!(chat = %chat, file = %name, error = %e, "Failed to post progress"),
                },
                Some(id) => {
                    if let Err(e) = self.sink.edit(chat, id, text).await {
                        debug!(chat = %chat, file = %name, error = %e, "Failed to edit progress");
                    }
                }
            }
            last_edit = Some(Instant::now());
        }

        if let Some(id) = status {
            let done = render_progress(direction, &name, *progress.borrow());
            if let Err(e) = self.sink.edit(chat, id, done).await {
                debug!(chat = %chat, file = %name, error = %e, "Failed to edit progress");
            }
            if let Err(e) = self.sink.delete(chat, id).await {
                warn!(chat = %chat, file = %name, error = %e, "Failed to delete progress message");
            }
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;

pub mod telegram;
pub mod telegram_groups;
pub mod telegram_media;
pub mod telegram_progress;

pub mod rate_limiter;
pub use rate_limiter::{ChatRateLimiter, RateLimitPolicy, RateLimitResult};

pub use telegram::{remote_ref, TelegramAdapter};
pub use telegram_groups::{ObservedMessages, DEFAULT_HISTORY_PER_CHAT};
pub use telegram_media::{ProgressReader, TelegramTransport};
pub use telegram_progress::{render_progress, StatusSink, TelegramProgressReporter, EDIT_INTERVAL};

/// All channel adapters implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Run the adapter's update loop until shutdown.
    async fn start(self: Arc<Self>) -> anyhow::Result<()>;
}

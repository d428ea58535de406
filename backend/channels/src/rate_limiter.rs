//! Per-chat rate limiting for status messages.
//!
//! Telegram throttles bots that edit messages in one chat too often; several
//! concurrent transfers each own a status message, so their edits share one
//! fixed-window bucket per chat.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quickzip_core::SessionId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// Max messages sent or edited per window.
    pub max_messages: u32,
    pub window_secs: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_messages: 20,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Seconds until the window resets.
    pub reset_in_secs: u64,
    pub remaining: u32,
}

struct BucketState {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct ChatRateLimiter {
    policy: RateLimitPolicy,
    buckets: Arc<Mutex<HashMap<SessionId, BucketState>>>,
}

impl ChatRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Take one slot from the chat's bucket if any is left.
    pub async fn check(&self, chat: SessionId) -> RateLimitResult {
        let window = Duration::from_secs(self.policy.window_secs);
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        let state = buckets.entry(chat).or_insert_with(|| BucketState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = now;
        }

        let elapsed = now.duration_since(state.window_start);
        let reset_in_secs = window.saturating_sub(elapsed).as_secs();

        if state.count < self.policy.max_messages {
            state.count += 1;
            let remaining = self.policy.max_messages - state.count;
            RateLimitResult {
                allowed: true,
                reset_in_secs,
                remaining,
            }
        } else {
            debug!(chat = %chat, count = state.count, "Status update rate limited");
            RateLimitResult {
                allowed: false,
                reset_in_secs,
                remaining: 0,
            }
        }
    }

    /// Drop buckets whose window has passed.
    pub async fn cleanup(&self) {
        let window = Duration::from_secs(self.policy.window_secs);
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, state| now.duration_since(state.window_start) < window);
    }
}

impl Default for ChatRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_messages: u32) -> ChatRateLimiter {
        ChatRateLimiter::new(RateLimitPolicy {
            max_messages,
            window_secs: 60,
        })
    }

    #[tokio::test]
    async fn limits_after_max() {
        let limiter = limiter(2);
        assert!(limiter.check(SessionId(1)).await.allowed);
        assert!(limiter.check(SessionId(1)).await.allowed);
        assert!(!limiter.check(SessionId(1)).await.allowed);
    }

    #[tokio::test]
    async fn chats_have_separate_buckets() {
        let limiter = limiter(1);
        assert!(limiter.check(SessionId(1)).await.allowed);
        assert!(limiter.check(SessionId(2)).await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets() {
        let limiter = limiter(1);
        assert!(limiter.check(SessionId(1)).await.allowed);
        assert!(!limiter.check(SessionId(1)).await.allowed);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check(SessionId(1)).await.allowed);
        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.cleanup().await;
        assert!(limiter.buckets.lock().await.is_empty());
    }
}

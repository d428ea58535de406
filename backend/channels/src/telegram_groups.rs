//! Telegram Observed Messages
//!
//! The Bot API cannot fetch an arbitrary message by id, so album lookups are
//! answered from the payload-bearing posts the bot has already seen.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use quickzip_core::{MessageId, MessageSource, RemoteRef, SessionId};
use tokio::sync::RwLock;

/// Posts remembered per chat before the oldest are forgotten.
pub const DEFAULT_HISTORY_PER_CHAT: usize = 2_000;

pub struct ObservedMessages {
    chats: RwLock<HashMap<SessionId, BTreeMap<MessageId, RemoteRef>>>,
    per_chat: usize,
}

impl ObservedMessages {
    pub fn new(per_chat: usize) -> Self {
        Self {
            chats: RwLock::new(HashMap::new()),
            per_chat: per_chat.max(1),
        }
    }

    /// Remember a post. Posts without a payload are never looked up and are skipped.
    pub async fn record(&self, reference: RemoteRef) {
        if !reference.is_fetchable() {
            return;
        }
        let mut chats = self.chats.write().await;
        let history = chats.entry(reference.session).or_default();
        history.insert(reference.id, reference);
        while history.len() > self.per_chat {
            history.pop_first();
        }
    }

    pub async fn len(&self, session: SessionId) -> usize {
        self.chats
            .read()
            .await
            .get(&session)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

impl Default for ObservedMessages {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_PER_CHAT)
    }
}

#[async_trait]
impl MessageSource for ObservedMessages {
    async fn get_messages(
        &self,
        session: SessionId,
        ids: &[MessageId],
    ) -> anyhow::Result<Vec<Option<RemoteRef>>> {
        let chats = self.chats.read().await;
        let history = chats.get(&session);
        Ok(ids
            .iter()
            .map(|id| history.and_then(|h| h.get(id)).cloned())
            .collect())
    }
}

//! Who may talk to the bot.

use std::sync::Arc;

use quickzip_core::SessionId;
use tracing::warn;

use crate::approved_chats::ApprovalStore;

#[derive(Clone)]
pub struct AccessPolicy {
    /// Telegram user id of the operator. `None` disables admin commands.
    admin_id: Option<i64>,
    store: Arc<dyn ApprovalStore>,
}

impl AccessPolicy {
    pub fn new(admin_id: Option<i64>, store: Arc<dyn ApprovalStore>) -> Self {
        Self { admin_id, store }
    }

    pub fn store(&self) -> &Arc<dyn ApprovalStore> {
        &self.store
    }

    pub fn is_admin(&self, user_id: Option<i64>) -> bool {
        matches!((self.admin_id, user_id), (Some(admin), Some(user)) if admin == user)
    }

    /// Admins always pass; everyone else needs an approved chat. A store
    /// failure counts as not approved.
    pub fn is_allowed(&self, chat: SessionId, user_id: Option<i64>) -> bool {
        if self.is_admin(user_id) {
            return true;
        }
        match self.store.is_approved(chat) {
            Ok(approved) => approved,
            Err(e) => {
                warn!(chat = %chat, error = %e, "Approval lookup failed; denying");
                false
            }
        }
    }
}

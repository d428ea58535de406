//! Approved chats, persisted in SQLite.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use quickzip_core::SessionId;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

/// Existence check plus insert/delete over the set of chats allowed to use
/// the bot.
pub trait ApprovalStore: Send + Sync {
    fn is_approved(&self, chat: SessionId) -> Result<bool>;
    /// Returns false when the chat was already approved.
    fn add(&self, chat: SessionId) -> Result<bool>;
    /// Returns false when the chat was not approved.
    fn remove(&self, chat: SessionId) -> Result<bool>;
    fn list(&self) -> Result<Vec<SessionId>>;
}

pub struct SqliteApprovalStore {
    conn: Mutex<Connection>,
}

impl SqliteApprovalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open approvals database")?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Approval store opened");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS approved_chats (
                chat_id     INTEGER PRIMARY KEY,
                approved_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("approval store lock poisoned"))?;
        f(&conn)
    }
}

impl ApprovalStore for SqliteApprovalStore {
    fn is_approved(&self, chat: SessionId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT chat_id FROM approved_chats WHERE chat_id = ?1",
                    params![chat.0],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn add(&self, chat: SessionId) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "INSERT INTO approved_chats (chat_id, approved_at) VALUES (?1, ?2)
                 ON CONFLICT(chat_id) DO NOTHING",
                params![chat.0, chrono::Utc::now().to_rfc3339()],
            )?;
            if n > 0 {
                info!(chat = %chat, "Chat approved");
            }
            Ok(n > 0)
        })
    }

    fn remove(&self, chat: SessionId) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM approved_chats WHERE chat_id = ?1", params![chat.0])?;
            if n > 0 {
                info!(chat = %chat, "Chat approval revoked");
            }
            Ok(n > 0)
        })
    }

    fn list(&self) -> Result<Vec<SessionId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT chat_id FROM approved_chats ORDER BY approved_at ASC")?;
            let chats = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(chats.into_iter().map(SessionId).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_check_remove() {
        let store = SqliteApprovalStore::in_memory().unwrap();
        let chat = SessionId(-100_500);
        assert!(!store.is_approved(chat).unwrap());
        assert!(store.add(chat).unwrap());
        assert!(!store.add(chat).unwrap());
        assert!(store.is_approved(chat).unwrap());
        assert_eq!(store.list().unwrap(), vec![chat]);
        assert!(store.remove(chat).unwrap());
        assert!(!store.remove(chat).unwrap());
        assert!(!store.is_approved(chat).unwrap());
    }

    #[test]
    fn approvals_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("approvals.sqlite");
        SqliteApprovalStore::open(&path).unwrap().add(SessionId(42)).unwrap();
        let reopened = SqliteApprovalStore::open(&path).unwrap();
        assert!(reopened.is_approved(SessionId(42)).unwrap());
    }
}

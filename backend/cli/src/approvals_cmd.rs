//! `quickzip approve` / `revoke` / `approvals`: edit the approved-chat table
//! without going through the bot.

use std::path::Path;

use anyhow::Result;
use quickzip_core::SessionId;
use quickzip_security::{ApprovalStore, SqliteApprovalStore};

use crate::terminal_output::{note_info, note_success, render_table};

async fn open_store(config_path: &Path) -> Result<SqliteApprovalStore> {
    let (config, _) = quickzip_config::load_and_prepare(config_path).await?;
    SqliteApprovalStore::open(&config.database_path())
}

pub async fn approve(config_path: &Path, chat_id: i64) -> Result<()> {
    let store = open_store(config_path).await?;
    if store.add(SessionId(chat_id))? {
        note_success(&format!("Chat {chat_id} approved"));
    } else {
        note_info(&format!("Chat {chat_id} was already approved"));
    }
    Ok(())
}

pub async fn revoke(config_path: &Path, chat_id: i64) -> Result<()> {
    let store = open_store(config_path).await?;
    if store.remove(SessionId(chat_id))? {
        note_success(&format!("Chat {chat_id} revoked"));
    } else {
        note_info(&format!("Chat {chat_id} was not approved"));
    }
    Ok(())
}

pub async fn list(config_path: &Path) -> Result<()> {
    let store = open_store(config_path).await?;
    let chats = store.list()?;
    if chats.is_empty() {
        note_info("No chats are approved yet");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = chats.iter().map(|c| vec![c.to_string()]).collect();
    print!("{}", render_table(&["Chat"], &rows));
    Ok(())
}

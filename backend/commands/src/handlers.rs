/// Built-in command handlers.
///
/// Each handler is a concrete struct implementing `CommandHandler`. Workflow
/// handlers call into [`ZipService`] and turn its outcome into a reply.
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use quickzip_core::SessionId;
use quickzip_security::AccessPolicy;
use quickzip_tasks::Begun;
use tracing::info;

use crate::dispatch::{CommandContext, CommandHandler, CommandResponse};
use crate::registry::help_text;
use crate::replies;
use crate::service::ZipService;
use crate::types::BotCommand;

pub struct StartHandler;

#[async_trait]
impl CommandHandler for StartHandler {
    async fn handle(&self, _ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        Ok(CommandResponse::ok(replies::WELCOME))
    }
}

pub struct HelpHandler {
    pub policy: AccessPolicy,
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        Ok(CommandResponse::ok(help_text(self.policy.is_admin(ctx.user_id))))
    }
}

// ---------------------------------------------------------------------------
// Zip workflow
// ---------------------------------------------------------------------------

pub struct AddHandler {
    pub service: Arc<ZipService>,
}

#[async_trait]
impl CommandHandler for AddHandler {
    async fn handle(&self, ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        let text = match self.service.on_begin(ctx.session).await {
            Ok(Begun::Fresh) => replies::BEGIN.to_string(),
            Ok(Begun::Replaced) => replies::BEGIN_REPLACED.to_string(),
            Err(e) => replies::for_error(&e),
        };
        Ok(CommandResponse::ok(text))
    }
}

pub struct ListHandler {
    pub service: Arc<ZipService>,
}

#[async_trait]
impl CommandHandler for ListHandler {
    async fn handle(&self, ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        let text = match self.service.on_list(ctx.session).await {
            Ok(files) => replies::listing(&files),
            Err(e) => replies::for_error(&e),
        };
        Ok(CommandResponse::ok(text))
    }
}

pub struct CancelHandler {
    pub service: Arc<ZipService>,
}

#[async_trait]
impl CommandHandler for CancelHandler {
    async fn handle(&self, ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        if self.service.on_cancel(ctx.session).await {
            Ok(CommandResponse::ok(replies::CANCELLED))
        } else {
            Ok(CommandResponse::ok(replies::NOTHING_TO_CANCEL))
        }
    }
}

/// `/zip <name>`. The archive itself is the success reply; the text reply
/// only carries problems.
pub struct ZipHandler {
    pub service: Arc<ZipService>,
}

#[async_trait]
impl CommandHandler for ZipHandler {
    async fn handle(&self, ctx: &CommandContext, cmd: &BotCommand) -> Result<CommandResponse> {
        let BotCommand::Zip(Some(name)) = cmd else {
            return Ok(CommandResponse::ok(replies::ZIP_USAGE));
        };
        match self.service.on_finalize(ctx.session, name).await {
            Ok(report) => Ok(CommandResponse::ok(replies::finalize_summary(&report))),
            // The cancel command already answered.
            Err(quickzip_core::QuickZipError::Cancelled) => Ok(CommandResponse::silent()),
            Err(e) => Ok(CommandResponse::ok(replies::for_error(&e))),
        }
    }
}

pub struct UnzipHandler {
    pub service: Arc<ZipService>,
}

#[async_trait]
impl CommandHandler for UnzipHandler {
    async fn handle(&self, ctx: &CommandContext, _cmd: &BotCommand) -> Result<CommandResponse> {
        let Some(archive) = ctx.reply_to.clone().filter(|r| r.is_fetchable()) else {
            return Ok(CommandResponse::ok(replies::UNZIP_USAGE));
        };
        let text = match self.service.on_extract(ctx.session, archive).await {
            Ok(report) => replies::extract_summary(&report),
            Err(e) => replies::for_error(&e),
        };
        Ok(CommandResponse::ok(text))
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// `/approve` and `/disapprove`. Without an argument they act on the current chat.
pub struct ApprovalHandler {
    pub policy: AccessPolicy,
}

#[async_trait]
impl CommandHandler for ApprovalHandler {
    async fn handle(&self, ctx: &CommandContext, cmd: &BotCommand) -> Result<CommandResponse> {
        let store = self.policy.store();
        let text = match cmd {
            BotCommand::Approve(target) => {
                let chat = target.map(SessionId).unwrap_or(ctx.session);
                if store.add(chat)? {
                    info!(chat = %chat, "Chat approved");
                    format!("Chat {chat} approved.")
                } else {
                    format!("Chat {chat} was already approved.")
                }
            }
            BotCommand::Disapprove(target) => {
                let chat = target.map(SessionId).unwrap_or(ctx.session);
                if store.remove(chat)? {
                    info!(chat = %chat, "Chat approval revoked");
                    format!("Chat {chat} is no longer approved.")
                } else {
                    format!("Chat {chat} was not approved.")
                }
            }
            _ => return Ok(CommandResponse::silent()),
        };
        Ok(CommandResponse::ok(text))
    }
}

/// Command dispatch: route detected commands to handlers behind the access gate.
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use quickzip_core::{QuickZipError, RemoteRef, SessionId};
use quickzip_security::AccessPolicy;
use tracing::{debug, info, warn};

use crate::replies;
use crate::service::ZipService;
use crate::types::BotCommand;

/// Context passed to every command handler.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub session: SessionId,
    pub user_id: Option<i64>,
    /// The post the command replied to, if any.
    pub reply_to: Option<RemoteRef>,
}

impl CommandContext {
    pub fn new(session: SessionId, user_id: Option<i64>) -> Self {
        Self {
            session,
            user_id,
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, reference: RemoteRef) -> Self {
        self.reply_to = Some(reference);
        self
    }
}

/// Text to send back. An empty text means stay quiet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub text: String,
}

impl CommandResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn silent() -> Self {
        Self {
            text: String::new(),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.text.is_empty()
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext, cmd: &BotCommand) -> Result<CommandResponse>;
}

pub struct CommandDispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    policy: AccessPolicy,
    service: Arc<ZipService>,
}

impl CommandDispatcher {
    pub fn new(service: Arc<ZipService>, policy: AccessPolicy) -> Self {
        Self {
            handlers: HashMap::new(),
            policy,
            service,
        }
    }

    pub fn register(&mut self, key: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(key.into(), handler);
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn service(&self) -> &Arc<ZipService> {
        &self.service
    }

    pub async fn dispatch(&self, ctx: &CommandContext, cmd: &BotCommand) -> Result<CommandResponse> {
        if !cmd.is_public() && !self.policy.is_allowed(ctx.session, ctx.user_id) {
            debug!(session = %ctx.session, command = %cmd, "Command from unapproved chat");
            return Ok(CommandResponse::ok(replies::NOT_APPROVED));
        }
        if cmd.is_admin_only() && !self.policy.is_admin(ctx.user_id) {
            warn!(session = %ctx.session, user = ?ctx.user_id, command = %cmd, "Admin command refused");
            return Ok(CommandResponse::ok(replies::ADMIN_ONLY));
        }

        match self.handlers.get(cmd.key()) {
            Some(handler) => {
                info!(session = %ctx.session, command = %cmd, "Dispatching command");
                handler.handle(ctx, cmd).await
            }
            None => Ok(CommandResponse::ok(replies::UNKNOWN_COMMAND)),
        }
    }

    /// Offer a payload-bearing post to the chat's open task. Posts that
    /// arrive with no task open are ignored.
    pub async fn handle_payload(&self, ctx: &CommandContext, reference: RemoteRef) -> CommandResponse {
        if !self.policy.is_allowed(ctx.session, ctx.user_id) {
            return CommandResponse::silent();
        }
        match self.service.on_payload_reference(ctx.session, reference).await {
            Ok(_) => CommandResponse::silent(),
            Err(QuickZipError::NoTask) => CommandResponse::silent(),
            Err(QuickZipError::Admission(_)) => CommandResponse::ok(replies::OVER_LIMIT),
            Err(e) => CommandResponse::ok(replies::for_error(&e)),
        }
    }
}

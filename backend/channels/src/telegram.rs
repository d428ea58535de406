use std::sync::Arc;

use async_trait::async_trait;
use quickzip_commands::{
    builtin_commands, detect_command, CommandContext, CommandDispatcher, CommandResponse,
};
use quickzip_core::{Attachment, AttachmentKind, RemoteRef, SessionId};
use teloxide::prelude::*;
use teloxide::types::BotCommand as MenuCommand;
use tracing::{error, info, warn};

use crate::telegram_groups::ObservedMessages;
use crate::ChannelAdapter;

pub struct TelegramAdapter {
    bot: Bot,
    dispatcher: Arc<CommandDispatcher>,
    observed: Arc<ObservedMessages>,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, dispatcher: Arc<CommandDispatcher>, observed: Arc<ObservedMessages>) -> Self {
        Self {
            bot,
            dispatcher,
            observed,
        }
    }

    async fn register_menu(&self) {
        let menu: Vec<MenuCommand> = builtin_commands()
            .into_iter()
            .filter(|c| !c.admin_only)
            .map(|c| MenuCommand::new(c.key, c.description))
            .collect();
        if let Err(e) = self.bot.set_my_commands(menu).await {
            warn!(error = %e, "Failed to register the command menu");
        }
    }

    async fn handle_message(self: Arc<Self>, msg: Message, username: Option<Arc<str>>) {
        let reference = remote_ref(&msg);
        self.observed.record(reference.clone()).await;

        let session = reference.session;
        let mut ctx = CommandContext::new(session, msg.from.as_ref().map(|u| u.id.0 as i64));

        let Some(text) = msg.text() else {
            if reference.is_fetchable() {
                let reply = self.dispatcher.handle_payload(&ctx, reference).await;
                self.reply(session, reply).await;
            }
            return;
        };
        let Some(cmd) = detect_command(text, username.as_deref()) else {
            return;
        };
        if let Some(replied) = msg.reply_to_message() {
            ctx = ctx.replying_to(remote_ref(replied));
        }

        // Updates of one chat are handled in order; a finalize running inline
        // would hold back the /cancel meant to stop it.
        if cmd.is_long_running() {
            tokio::spawn(async move {
                let reply = self.dispatcher.dispatch(&ctx, &cmd).await;
                self.finish(session, reply).await;
            });
        } else {
            let reply = self.dispatcher.dispatch(&ctx, &cmd).await;
            self.finish(session, reply).await;
        }
    }

    async fn finish(&self, session: SessionId, reply: anyhow::Result<CommandResponse>) {
        match reply {
            Ok(reply) => self.reply(session, reply).await,
            Err(e) => {
                error!(session = %session, error = %e, "Command failed");
                let text = format!(
                    "An error occurred: {}",
                    quickzip_logging::redact_sensitive_data(&e.to_string())
                );
                self.reply(session, CommandResponse::ok(text)).await;
            }
        }
    }

    async fn reply(&self, session: SessionId, reply: CommandResponse) {
        if reply.is_silent() {
            return;
        }
        if let Err(e) = self.bot.send_message(ChatId(session.0), reply.text).await {
            warn!(session = %session, error = %e, "Failed to send reply");
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        let me = self.bot.get_me().await?;
        let username: Option<Arc<str>> = me.user.username.clone().map(Arc::from);
        info!(bot = ?username, "Starting Telegram adapter");
        self.register_menu().await;

        let handler = Update::filter_message().endpoint({
            let adapter = Arc::clone(&self);
            move |msg: Message| {
                let adapter = Arc::clone(&adapter);
                let username = username.clone();
                async move {
                    adapter.handle_message(msg, username).await;
                    respond(())
                }
            }
        });

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        info!("Telegram adapter stopped");
        Ok(())
    }
}

/// Describe a Telegram message as a [`RemoteRef`]. The session is the chat.
pub fn remote_ref(msg: &Message) -> RemoteRef {
    let mut reference = RemoteRef::new(SessionId(msg.chat.id.0), msg.id.0);
    if let Some(group) = msg.media_group_id() {
        reference = reference.with_group(group.to_string());
    }
    match attachment(msg) {
        Some(a) => reference.with_attachment(a),
        None => reference,
    }
}

fn attachment(msg: &Message) -> Option<Attachment> {
    if let Some(doc) = msg.document() {
        return Some(Attachment {
            file_id: doc.file.id.to_string(),
            name: doc.file_name.clone(),
            size: u64::from(doc.file.size),
            content_type: doc.mime_type.as_ref().map(|m| m.to_string()),
            kind: AttachmentKind::Document,
        });
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(Attachment {
            file_id: photo.file.id.to_string(),
            name: None,
            size: u64::from(photo.file.size),
            content_type: Some("image/jpeg".to_string()),
            kind: AttachmentKind::Photo,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Attachment {
            file_id: video.file.id.to_string(),
            name: video.file_name.clone(),
            size: u64::from(video.file.size),
            content_type: video.mime_type.as_ref().map(|m| m.to_string()),
            kind: AttachmentKind::Video,
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(Attachment {
            file_id: audio.file.id.to_string(),
            name: audio.file_name.clone(),
            size: u64::from(audio.file.size),
            content_type: audio.mime_type.as_ref().map(|m| m.to_string()),
            kind: AttachmentKind::Audio,
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Attachment {
            file_id: voice.file.id.to_string(),
            name: None,
            size: u64::from(voice.file.size),
            content_type: voice.mime_type.as_ref().map(|m| m.to_string()),
            kind: AttachmentKind::Voice,
        });
    }
    if let Some(animation) = msg.animation() {
        return Some(Attachment {
            file_id: animation.file.id.to_string(),
            name: animation.file_name.clone(),
            size: u64::from(animation.file.size),
            content_type: animation.mime_type.as_ref().map(|m| m.to_string()),
            kind: AttachmentKind::Animation,
        });
    }
    None
}

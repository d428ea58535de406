//! Telegram Media Transport
//!
//! Streams payloads from the Bot API file endpoint to disk and uploads local
//! files back as documents, publishing byte progress in both directions.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use quickzip_core::{PayloadTransport, ProgressSender, RemoteRef, SessionId, TransferError};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use teloxide::{ApiError, RequestError};
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio_stream::StreamExt;
use tracing::{debug, info};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn fetch_into(
        &self,
        file_id: &str,
        expected: u64,
        path: &Path,
        progress: &ProgressSender,
    ) -> Result<(), TransferError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(request_error)?;
        let total = if file.size > 0 { u64::from(file.size) } else { expected };

        let mut out = tokio::fs::File::create(path).await?;
        let mut stream = self.bot.download_file_stream(&file.path);
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::Network(e.to_string()))?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.update(written, total);
        }
        out.flush().await?;
        progress.update(written, written);
        Ok(())
    }
}

#[async_trait]
impl PayloadTransport for TelegramTransport {
    async fn download(
        &self,
        reference: &RemoteRef,
        target: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, TransferError> {
        let attachment = reference.attachment.as_ref().ok_or_else(|| {
            TransferError::RemoteGone(format!("message {} has no payload", reference.id))
        })?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let path = target.to_path_buf();

        debug!(message_id = reference.id, file = %path.display(), "Downloading payload");
        if let Err(e) = self
            .fetch_into(&attachment.file_id, attachment.size, &path, &progress)
            .await
        {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(path)
    }

    async fn upload(
        &self,
        session: SessionId,
        file: &Path,
        caption: &str,
        progress: ProgressSender,
    ) -> Result<(), TransferError> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let total = tokio::fs::metadata(file).await?.len();
        let reader = ProgressReader::new(tokio::fs::File::open(file).await?, progress, total);

        let mut request = self
            .bot
            .send_document(ChatId(session.0), InputFile::read(reader).file_name(name.clone()));
        if !caption.is_empty() {
            request = request.caption(caption);
        }
        request.await.map_err(request_error)?;
        info!(session = %session, file = %name, bytes = total, "Uploaded document");
        Ok(())
    }
}

fn request_error(e: RequestError) -> TransferError {
    match e {
        RequestError::Network(e) => TransferError::Network(e.to_string()),
        RequestError::Io(e) => TransferError::Io(e.to_string()),
        RequestError::Api(
            api @ (ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound),
        ) => TransferError::Permission(api.to_string()),
        RequestError::Api(api) => TransferError::RemoteGone(api.to_string()),
        other => TransferError::Network(other.to_string()),
    }
}

/// Counts bytes as the request body is read and publishes them.
pub struct ProgressReader<R> {
    inner: R,
    progress: ProgressSender,
    read: u64,
    total: u64,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: ProgressSender, total: u64) -> Self {
        Self {
            inner,
            progress,
            read: 0,
            total,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let n = (buf.filled().len() - before) as u64;
            self.read += n;
            let (read, total) = (self.read, self.total);
            self.progress.update(read, total);
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickzip_core::progress_channel;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn reader_reports_every_byte() {
        let body = vec![7u8; 10_000];
        let (tx, rx) = progress_channel(body.len() as u64);
        let mut reader = ProgressReader::new(body.as_slice(), tx, body.len() as u64);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, body);
        assert!(rx.borrow().is_complete());
    }

    #[test]
    fn blocked_bot_is_a_permission_error() {
        let e = request_error(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(e, TransferError::Permission(_)));
    }
}

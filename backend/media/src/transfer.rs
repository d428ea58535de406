//! Transfer Unit: one concurrent fetch or push of a single payload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quickzip_core::{
    progress_channel, PayloadTransport, ProgressReceiver, RemoteRef, SessionId, TransferError,
};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// A spawned transfer. Dropping the unit before it finishes aborts it.
pub struct TransferUnit<T> {
    name: String,
    handle: JoinHandle<Result<T, TransferError>>,
    progress: ProgressReceiver,
}

impl TransferUnit<PathBuf> {
    /// Start fetching `reference` into the file `target`.
    pub fn download(transport: Arc<dyn PayloadTransport>, reference: RemoteRef, target: PathBuf) -> Self {
        let name = file_label(&target);
        let (tx, progress) = progress_channel(reference.payload_size());
        debug!(file = %name, message_id = reference.id, "Starting download");
        let handle = tokio::spawn(async move { transport.download(&reference, &target, tx).await });
        Self {
            name,
            handle,
            progress,
        }
    }
}

impl TransferUnit<()> {
    /// Start pushing `file` to `session` as a document.
    pub fn upload(
        transport: Arc<dyn PayloadTransport>,
        session: SessionId,
        file: PathBuf,
        caption: String,
        total: u64,
    ) -> Self {
        let name = file_label(&file);
        let (tx, progress) = progress_channel(total);
        debug!(file = %name, session = %session, "Starting upload");
        let handle =
            tokio::spawn(async move { transport.upload(session, &file, &caption, tx).await });
        Self {
            name,
            handle,
            progress,
        }
    }
}

impl<T> TransferUnit<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A fresh observer of this unit's progress.
    pub fn progress(&self) -> ProgressReceiver {
        self.progress.clone()
    }

    /// Handle that cancels the transfer without consuming the unit.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the terminal outcome. An aborted unit reports `Cancelled`.
    pub async fn outcome(mut self) -> Result<T, TransferError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TransferError::Cancelled),
            Err(e) => Err(TransferError::Io(format!("transfer task failed: {e}"))),
        }
    }
}

impl<T> Drop for TransferUnit<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

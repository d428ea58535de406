use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransferError;
use crate::progress::{ProgressReceiver, ProgressSender};
use crate::types::{MessageId, RemoteRef, SessionId};

/// Read access to posts on the source platform.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Look up posts by sequence id. The result is positionally aligned with
    /// `ids`; ids that do not exist (or are not visible) map to `None`.
    async fn get_messages(
        &self,
        session: SessionId,
        ids: &[MessageId],
    ) -> anyhow::Result<Vec<Option<RemoteRef>>>;
}

/// Moves one payload between the platform and local storage.
#[async_trait]
pub trait PayloadTransport: Send + Sync {
    /// Fetch the payload of `reference` into the file `target`, creating its
    /// directory if needed, and return the written path.
    async fn download(
        &self,
        reference: &RemoteRef,
        target: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, TransferError>;

    /// Push a local file to the session as a document.
    async fn upload(
        &self,
        session: SessionId,
        file: &Path,
        caption: &str,
        progress: ProgressSender,
    ) -> Result<(), TransferError>;
}

/// Which way a transfer goes; observers render them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Renders transfer progress to the user. Implementations must return
/// immediately; any waiting happens on their own tasks.
pub trait ProgressObserver: Send + Sync {
    fn observe(&self, session: SessionId, direction: Direction, name: &str, progress: ProgressReceiver);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn observe(&self, _: SessionId, _: Direction, _: &str, _: ProgressReceiver) {}
}

//! In-memory collaborators for exercising the pipeline without a network.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quickzip_core::{
    Attachment, AttachmentKind, MessageId, MessageSource, PayloadTransport, ProgressSender,
    RemoteRef, SessionId, TransferError,
};

/// A post in session 7 named `f{id}.bin`; `size: None` means no payload.
pub fn post(id: MessageId, group: Option<&str>, size: Option<u64>) -> RemoteRef {
    let mut r = RemoteRef::new(SessionId(7), id);
    if let Some(g) = group {
        r = r.with_group(g);
    }
    if let Some(size) = size {
        r = r.with_attachment(Attachment {
            file_id: format!("file-{id}"),
            name: Some(format!("f{id}.bin")),
            size,
            content_type: None,
            kind: AttachmentKind::Document,
        });
    }
    r
}

/// A standalone document post in session 7 with an explicit file name.
pub fn named_post(id: MessageId, name: &str, size: u64) -> RemoteRef {
    let mut r = post(id, None, Some(size));
    if let Some(a) = r.attachment.as_mut() {
        a.name = Some(name.to_string());
    }
    r
}

/// Platform lookup backed by a map of posts.
#[derive(Default)]
pub struct FakeMessageSource {
    posts: Mutex<HashMap<MessageId, RemoteRef>>,
    fail: AtomicBool,
}

impl FakeMessageSource {
    pub fn with(posts: impl IntoIterator<Item = RemoteRef>) -> Self {
        let source = Self::default();
        for post in posts {
            source.insert(post);
        }
        source
    }

    pub fn failing() -> Self {
        let source = Self::default();
        source.set_failing(true);
        source
    }

    pub fn insert(&self, post: RemoteRef) {
        if let Ok(mut posts) = self.posts.lock() {
            posts.insert(post.id, post);
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSource for FakeMessageSource {
    async fn get_messages(
        &self,
        _session: SessionId,
        ids: &[MessageId],
    ) -> anyhow::Result<Vec<Option<RemoteRef>>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("lookup timed out");
        }
        let posts = self
            .posts
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(ids.iter().map(|id| posts.get(id).cloned()).collect())
    }
}

/// Transport that writes a few bytes per payload after a configurable delay
/// and records how many transfers ran at once.
#[derive(Default)]
pub struct FakeTransport {
    delays: HashMap<MessageId, Duration>,
    failures: HashSet<MessageId>,
    crashes: HashSet<MessageId>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    completed: AtomicUsize,
    contents: HashMap<MessageId, Vec<u8>>,
    uploads: Mutex<Vec<(SessionId, PathBuf, String)>>,
    bodies: Mutex<Vec<Vec<u8>>>,
    fail_uploads: bool,
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeTransport {
    pub fn with_delay(mut self, id: MessageId, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    pub fn with_failure(mut self, id: MessageId) -> Self {
        self.failures.insert(id);
        self
    }

    /// Panic inside the transfer for `id`, as a buggy transport would.
    pub fn with_crash(mut self, id: MessageId) -> Self {
        self.crashes.insert(id);
        self
    }

    /// Serve `body` instead of the default placeholder bytes.
    pub fn with_content(mut self, id: MessageId, body: impl Into<Vec<u8>>) -> Self {
        self.contents.insert(id, body.into());
        self
    }

    pub fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<(SessionId, PathBuf, String)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Bytes of every uploaded file, captured at upload time.
    pub fn upload_bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PayloadTransport for FakeTransport {
    async fn download(
        &self,
        reference: &RemoteRef,
        target: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, TransferError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(self.in_flight.clone());

        if let Some(delay) = self.delays.get(&reference.id) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.crashes.contains(&reference.id) {
            panic!("transport crashed on message {}", reference.id);
        }
        if self.failures.contains(&reference.id) {
            return Err(TransferError::RemoteGone(format!("message {} deleted", reference.id)));
        }

        // Synchronous writes keep paused-clock tests deterministic.
        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let path = target.to_path_buf();
        match self.contents.get(&reference.id) {
            Some(body) => std::fs::write(&path, body)?,
            None => std::fs::write(&path, reference.display_name().as_bytes())?,
        }
        let size = reference.payload_size();
        progress.update(size, size);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    async fn upload(
        &self,
        session: SessionId,
        file: &Path,
        caption: &str,
        progress: ProgressSender,
    ) -> Result<(), TransferError> {
        if self.fail_uploads {
            return Err(TransferError::Network("upload refused".into()));
        }
        let body = std::fs::read(file)?;
        let len = body.len() as u64;
        progress.update(len, len);
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push(body);
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((session, file.to_path_buf(), caption.to_string()));
        }
        Ok(())
    }
}

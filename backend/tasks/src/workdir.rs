//! Per-session working directories under one storage root.

use std::io;
use std::path::{Path, PathBuf};

use quickzip_core::SessionId;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkDirs {
    root: PathBuf,
}

impl WorkDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic working directory of a session's task.
    pub fn path_for(&self, session: SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    /// A fresh scratch directory for one extraction. Kept outside the task
    /// directory so a concurrent `/add` flow cannot delete it.
    pub fn extraction_path(&self, session: SessionId) -> PathBuf {
        self.root
            .join("extract")
            .join(format!("{session}-{}", Uuid::new_v4().simple()))
    }

    pub async fn ensure(&self, session: SessionId) -> io::Result<PathBuf> {
        let path = self.path_for(session);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }
}

/// Recursively delete `path`. A directory that was never created is fine.
pub async fn remove_dir(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(dir = %path.display(), "Removed working directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// [`remove_dir`] for teardown paths, where failure is only worth a log line.
pub async fn discard_dir(path: &Path) {
    if let Err(e) = remove_dir(path).await {
        warn!(dir = %path.display(), error = %e, "Failed to remove working directory");
    }
}

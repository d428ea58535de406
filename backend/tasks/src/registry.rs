//! Task Registry.
//!
//! One task per session. Every mutation goes through the registry lock and
//! the size ceiling is checked before a reference is stored, so a task's
//! committed size can never pass it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quickzip_core::{admit_within, QuickZipError, RemoteRef, SessionId, MAX_TASK_BYTES};
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::workdir::{discard_dir, WorkDirs};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Accepting references.
    Collecting,
    /// A finalize run owns the task and its directory.
    Finalizing,
}

#[derive(Debug)]
struct Task {
    references: Vec<RemoteRef>,
    last_activity: Instant,
    state: TaskState,
    cancel: watch::Sender<bool>,
}

impl Task {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            references: Vec::new(),
            last_activity: Instant::now(),
            state: TaskState::Collecting,
            cancel,
        }
    }

    fn committed_bytes(&self) -> u64 {
        self.references.iter().map(RemoteRef::payload_size).sum()
    }
}

/// One row of `/list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub content_type: Option<String>,
}

/// What `begin` did to an existing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begun {
    Fresh,
    /// A previous task was discarded.
    Replaced,
}

/// Handed to the finalize flow. Carries the references to fetch and a way to
/// learn that the user cancelled while the run is in progress.
#[derive(Debug)]
pub struct FinalizeTicket {
    pub session: SessionId,
    pub references: Vec<RemoteRef>,
    pub workdir: PathBuf,
    cancelled: watch::Receiver<bool>,
}

impl FinalizeTicket {
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the task is cancelled or evicted. Never resolves for a
    /// run that is allowed to finish.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        if rx.wait_for(|c| *c).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<SessionId, Task>>>,
    workdirs: WorkDirs,
    timeout: Duration,
    max_bytes: u64,
}

impl TaskRegistry {
    pub fn new(workdirs: WorkDirs) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            workdirs,
            timeout: DEFAULT_TASK_TIMEOUT,
            max_bytes: MAX_TASK_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn workdirs(&self) -> &WorkDirs {
        &self.workdirs
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Start a new task, discarding any previous one for the session. A task
    /// that is being finalized cannot be replaced.
    pub async fn begin(&self, session: SessionId) -> Result<Begun, QuickZipError> {
        let previous = {
            let mut tasks = self.tasks.write().await;
            if tasks.get(&session).map(|t| t.state) == Some(TaskState::Finalizing) {
                return Err(QuickZipError::Busy);
            }
            tasks.insert(session, Task::new())
        };

        match previous {
            Some(old) => {
                debug!(session = %session, dropped = old.references.len(), "Task replaced");
                discard_dir(&self.workdirs.path_for(session)).await;
                Ok(Begun::Replaced)
            }
            None => {
                debug!(session = %session, "Task started");
                Ok(Begun::Fresh)
            }
        }
    }

    /// Append `reference` if it fits under the ceiling. Returns the new
    /// committed size. A rejected reference leaves the task untouched.
    pub async fn try_append(&self, session: SessionId, reference: RemoteRef) -> Result<u64, QuickZipError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&session).ok_or(QuickZipError::NoTask)?;
        if task.state == TaskState::Finalizing {
            return Err(QuickZipError::Busy);
        }

        let committed = task.committed_bytes();
        admit_within(committed, reference.payload_size(), self.max_bytes).into_result()?;

        let total = committed + reference.payload_size();
        debug!(session = %session, message_id = reference.id, total, "Reference accepted");
        task.references.push(reference);
        task.last_activity = Instant::now();
        Ok(total)
    }

    pub async fn list(&self, session: SessionId) -> Result<Vec<ListedFile>, QuickZipError> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(&session).ok_or(QuickZipError::NoTask)?;
        Ok(task
            .references
            .iter()
            .map(|r| ListedFile {
                name: r.display_name(),
                content_type: r.attachment.as_ref().and_then(|a| a.content_type.clone()),
            })
            .collect())
    }

    pub async fn committed_bytes(&self, session: SessionId) -> Option<u64> {
        self.tasks.read().await.get(&session).map(Task::committed_bytes)
    }

    pub async fn contains(&self, session: SessionId) -> bool {
        self.tasks.read().await.contains_key(&session)
    }

    pub async fn state(&self, session: SessionId) -> Option<TaskState> {
        self.tasks.read().await.get(&session).map(|t| t.state)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Hand the task to a finalize run. The task stays registered, and
    /// protected from eviction, until [`finish`](Self::finish) or
    /// [`cancel`](Self::cancel).
    pub async fn start_finalize(&self, session: SessionId) -> Result<FinalizeTicket, QuickZipError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&session).ok_or(QuickZipError::NoTask)?;
        match task.state {
            TaskState::Finalizing => return Err(QuickZipError::Busy),
            TaskState::Collecting if task.references.is_empty() => return Err(QuickZipError::EmptyTask),
            TaskState::Collecting => {}
        }
        task.state = TaskState::Finalizing;
        task.last_activity = Instant::now();
        Ok(FinalizeTicket {
            session,
            references: task.references.clone(),
            workdir: self.workdirs.path_for(session),
            cancelled: task.cancel.subscribe(),
        })
    }

    /// End of a finalize run, whatever its outcome: forget the task and
    /// delete its directory.
    pub async fn finish(&self, ticket: FinalizeTicket) {
        {
            let mut tasks = self.tasks.write().await;
            if tasks.get(&ticket.session).map(|t| t.state) == Some(TaskState::Finalizing) {
                tasks.remove(&ticket.session);
            }
        }
        discard_dir(&ticket.workdir).await;
        debug!(session = %ticket.session, "Task finished");
    }

    /// Drop the session's task. A running finalize is told to stop and does
    /// its own directory cleanup. Returns false when there was no task.
    pub async fn cancel(&self, session: SessionId) -> bool {
        let Some(task) = self.tasks.write().await.remove(&session) else {
            return false;
        };
        self.tear_down(session, task).await;
        info!(session = %session, "Task cancelled");
        true
    }

    /// Remove every collecting task idle for longer than the timeout, with
    /// the same teardown as [`cancel`](Self::cancel).
    pub async fn evict_expired(&self) -> Vec<SessionId> {
        let now = Instant::now();
        let expired: Vec<(SessionId, Task)> = {
            let mut tasks = self.tasks.write().await;
            let stale: Vec<SessionId> = tasks
                .iter()
                .filter(|(_, t)| {
                    t.state == TaskState::Collecting
                        && now.saturating_duration_since(t.last_activity) > self.timeout
                })
                .map(|(s, _)| *s)
                .collect();
            stale
                .into_iter()
                .filter_map(|s| tasks.remove(&s).map(|t| (s, t)))
                .collect()
        };

        let mut evicted = Vec::with_capacity(expired.len());
        for (session, task) in expired {
            self.tear_down(session, task).await;
            evicted.push(session);
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle tasks");
        }
        evicted
    }

    async fn tear_down(&self, session: SessionId, task: Task) {
        task.cancel.send_replace(true);
        if task.state == TaskState::Collecting {
            discard_dir(&self.workdirs.path_for(session)).await;
        }
    }
}

//! Bounded Fetch Scheduler.
//!
//! A driver task walks the plan, keeps at most `concurrency` transfer units in
//! flight, and pushes events to the consumer in the order units finish.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use quickzip_core::{
    unique_file_name, MessageId, PayloadTransport, ProgressReceiver, RemoteRef, TransferError,
};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use crate::plan::FetchPlan;
use crate::transfer::TransferUnit;

pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum simultaneous transfers. Zero is treated as one.
    pub concurrency: usize,
    /// Directory the payloads are written into.
    pub dest: PathBuf,
}

impl FetchOptions {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dest: dest.into(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub reference: RemoteRef,
    pub path: PathBuf,
}

/// A member that was planned but never made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmittedMember {
    pub name: String,
    pub message_id: MessageId,
    pub error: TransferError,
}

#[derive(Debug)]
pub enum FetchEvent {
    /// A unit was admitted; `progress` follows its byte count.
    Started {
        name: String,
        message_id: MessageId,
        progress: ProgressReceiver,
    },
    Fetched(FetchedFile),
    Failed(OmittedMember),
}

/// Launch the plan. Events arrive through the returned stream; dropping or
/// cancelling the stream tears down every unit still running.
pub fn fetch_all(
    transport: Arc<dyn PayloadTransport>,
    plan: FetchPlan,
    options: FetchOptions,
) -> FetchStream {
    let limit = options.concurrency.max(1);
    let (tx, rx) = mpsc::channel(limit * 2 + 1);
    let driver = tokio::spawn(drive(transport, plan, options.dest, limit, tx));
    FetchStream {
        rx,
        driver,
        cancelled: false,
    }
}

type Joined = (RemoteRef, Result<PathBuf, TransferError>);

async fn drive(
    transport: Arc<dyn PayloadTransport>,
    plan: FetchPlan,
    dest: PathBuf,
    limit: usize,
    tx: mpsc::Sender<FetchEvent>,
) {
    let mut in_flight: JoinSet<Joined> = JoinSet::new();
    let mut launched: HashMap<Id, RemoteRef> = HashMap::new();
    // Distinct payloads may share a name; each one gets its own file.
    let mut taken: HashSet<String> = HashSet::new();
    debug!(members = plan.member_count(), limit, "Fetch started");

    for batch in plan.batches {
        // Members of one batch are launched back to back; the next batch is
        // only looked at once all of them are running.
        for member in batch.members {
            while in_flight.len() >= limit {
                let Some(joined) = in_flight.join_next_with_id().await else {
                    break;
                };
                if !forward(&tx, &mut launched, joined).await {
                    return;
                }
            }

            let target = dest.join(unique_file_name(&member.local_file_name(), &mut taken));
            let unit = TransferUnit::download(transport.clone(), member.clone(), target);
            let started = FetchEvent::Started {
                name: unit.name().to_string(),
                message_id: member.id,
                progress: unit.progress(),
            };
            let task = member.clone();
            let handle = in_flight.spawn(async move {
                let outcome = unit.outcome().await;
                (task, outcome)
            });
            launched.insert(handle.id(), member);
            if tx.send(started).await.is_err() {
                return;
            }
        }
    }

    while let Some(joined) = in_flight.join_next_with_id().await {
        if !forward(&tx, &mut launched, joined).await {
            return;
        }
    }
    debug!("Fetch drained");
}

/// Turn a finished unit into an event. Returns false once the consumer is gone.
async fn forward(
    tx: &mpsc::Sender<FetchEvent>,
    launched: &mut HashMap<Id, RemoteRef>,
    joined: Result<(Id, Joined), JoinError>,
) -> bool {
    let (reference, outcome) = match joined {
        Ok((id, joined)) => {
            launched.remove(&id);
            joined
        }
        Err(e) => {
            let Some(reference) = launched.remove(&e.id()) else {
                warn!(error = %e, "Unknown transfer task ended abnormally");
                return true;
            };
            let error = if e.is_cancelled() {
                TransferError::Cancelled
            } else {
                TransferError::Io(format!("transfer task failed: {e}"))
            };
            (reference, Err(error))
        }
    };

    let event = match outcome {
        Ok(path) => {
            info!(message_id = reference.id, file = %path.display(), "Fetched payload");
            FetchEvent::Fetched(FetchedFile { reference, path })
        }
        Err(error) => {
            warn!(message_id = reference.id, error = %error, "Transfer failed; member omitted");
            FetchEvent::Failed(OmittedMember {
                name: reference.display_name(),
                message_id: reference.id,
                error,
            })
        }
    };
    tx.send(event).await.is_ok()
}

/// Completion-ordered events from a running fetch.
pub struct FetchStream {
    rx: mpsc::Receiver<FetchEvent>,
    driver: JoinHandle<()>,
    cancelled: bool,
}

impl FetchStream {
    /// Next event, or `None` once every unit is terminal or the fetch was
    /// cancelled.
    pub async fn next(&mut self) -> Option<FetchEvent> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Abort the driver and every unit in flight. Nothing is yielded after
    /// this, including events that were already queued.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.driver.abort();
        self.rx.close();
        debug!("Fetch cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Stream for FetchStream {
    type Item = FetchEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FetchEvent>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for FetchStream {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FetchBatch;
    use crate::testing::{named_post, post, FakeTransport};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn plan_of(ids: &[MessageId]) -> FetchPlan {
        FetchPlan::from_expanded(ids.iter().map(|id| post(*id, None, Some(10))).collect())
    }

    /// Drain the stream, returning fetched ids and failed ids in arrival order.
    async fn drain(stream: &mut FetchStream) -> (Vec<MessageId>, Vec<MessageId>) {
        let (mut fetched, mut failed) = (Vec::new(), Vec::new());
        while let Some(event) = stream.next().await {
            match event {
                FetchEvent::Fetched(f) => fetched.push(f.reference.id),
                FetchEvent::Failed(o) => failed.push(o.message_id),
                FetchEvent::Started { .. } => {}
            }
        }
        (fetched, failed)
    }

    #[tokio::test(start_paused = true)]
    async fn yields_in_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::default()
                .with_delay(1, Duration::from_secs(30))
                .with_delay(2, Duration::from_secs(10))
                .with_delay(3, Duration::from_secs(20)),
        );
        let mut stream = fetch_all(transport, plan_of(&[1, 2, 3]), FetchOptions::new(dir.path()));
        let (fetched, failed) = drain(&mut stream).await;
        assert_eq!(fetched, vec![2, 3, 1]);
        assert!(failed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn limit_of_one_is_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::default()
                .with_delay(1, Duration::from_secs(30))
                .with_delay(2, Duration::from_secs(1))
                .with_delay(4, Duration::from_secs(5)),
        );
        let options = FetchOptions::new(dir.path()).with_concurrency(1);
        let mut stream = fetch_all(transport.clone(), plan_of(&[1, 2, 3, 4]), options);
        let (fetched, _) = drain(&mut stream).await;
        assert_eq!(fetched, vec![1, 2, 3, 4]);
        assert_eq!(transport.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = FakeTransport::default();
        for id in 1..=12 {
            transport = transport.with_delay(id, Duration::from_secs((id as u64 * 7) % 5 + 1));
        }
        let transport = Arc::new(transport);
        let ids: Vec<MessageId> = (1..=12).collect();
        let options = FetchOptions::new(dir.path()).with_concurrency(3);
        let mut stream = fetch_all(transport.clone(), plan_of(&ids), options);
        let (fetched, _) = drain(&mut stream).await;
        assert_eq!(fetched.len(), 12);
        assert_eq!(transport.max_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_unit_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default().with_failure(2));
        let mut stream = fetch_all(transport, plan_of(&[1, 2, 3]), FetchOptions::new(dir.path()));

        let mut omitted = Vec::new();
        let mut fetched = Vec::new();
        while let Some(event) = stream.next().await {
            match event {
                FetchEvent::Fetched(f) => fetched.push(f.reference.id),
                FetchEvent::Failed(o) => omitted.push(o),
                FetchEvent::Started { .. } => {}
            }
        }
        fetched.sort();
        assert_eq!(fetched, vec![1, 3]);
        assert_eq!(omitted.len(), 1);
        assert_eq!(omitted[0].name, "f2.bin");
        assert!(matches!(omitted[0].error, TransferError::RemoteGone(_)));
    }

    #[tokio::test]
    async fn empty_plan_ends_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let mut stream = fetch_all(transport, FetchPlan::default(), FetchOptions::new(dir.path()));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_all_further_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = FakeTransport::default().with_delay(1, Duration::from_secs(1));
        for id in 2..=5 {
            transport = transport.with_delay(id, Duration::from_secs(10));
        }
        let transport = Arc::new(transport);
        let options = FetchOptions::new(dir.path()).with_concurrency(2);
        let mut stream = fetch_all(transport.clone(), plan_of(&[1, 2, 3, 4, 5]), options);

        loop {
            match stream.next().await {
                Some(FetchEvent::Fetched(f)) => {
                    assert_eq!(f.reference.id, 1);
                    break;
                }
                Some(_) => continue,
                None => panic!("stream ended before the first completion"),
            }
        }
        stream.cancel();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(stream.next().await.is_none());
        assert_eq!(transport.completed(), 1);
        assert!(!dir.path().join("f2.bin").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_aborts_units() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default().with_delay(1, Duration::from_secs(10)));
        let mut stream = fetch_all(transport.clone(), plan_of(&[1]), FetchOptions::new(dir.path()));
        assert!(matches!(stream.next().await, Some(FetchEvent::Started { .. })));
        drop(stream);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn group_members_launch_before_the_next_batch() {
        let dir = tempfile::tempdir().unwrap();
        let album: Vec<_> = (1..=3).map(|id| post(id, Some("g"), Some(5))).collect();
        let plan = FetchPlan {
            batches: vec![
                FetchBatch {
                    group_id: Some("g".into()),
                    members: album,
                },
                FetchBatch {
                    group_id: None,
                    members: vec![post(9, None, Some(5))],
                },
            ],
            total_bytes: 20,
            truncated_groups: Vec::new(),
        };
        let transport = Arc::new(
            FakeTransport::default()
                .with_delay(1, Duration::from_secs(3))
                .with_delay(2, Duration::from_secs(1)),
        );
        let options = FetchOptions::new(dir.path()).with_concurrency(2);
        let mut stream = fetch_all(transport, plan, options);

        let mut started = Vec::new();
        while let Some(event) = stream.next().await {
            if let FetchEvent::Started { message_id, .. } = event {
                started.push(message_id);
            }
        }
        assert_eq!(started, vec![1, 2, 3, 9]);
    }

    #[tokio::test]
    async fn payloads_sharing_a_name_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            FakeTransport::default()
                .with_content(1, "first")
                .with_content(2, "second"),
        );
        let plan = FetchPlan::from_expanded(vec![
            named_post(1, "report.pdf", 5),
            named_post(2, "report.pdf", 6),
        ]);
        let mut stream = fetch_all(transport, plan, FetchOptions::new(dir.path()));

        let mut paths = Vec::new();
        while let Some(event) = stream.next().await {
            if let FetchEvent::Fetched(f) = event {
                paths.push((f.reference.id, f.path));
            }
        }
        paths.sort();
        assert_eq!(
            paths,
            vec![
                (1, dir.path().join("report.pdf")),
                (2, dir.path().join("report (1).pdf")),
            ]
        );
        assert_eq!(std::fs::read_to_string(&paths[0].1).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&paths[1].1).unwrap(), "second");
    }

    #[tokio::test]
    async fn crashed_transfer_is_reported_as_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default().with_crash(2));
        let mut stream = fetch_all(transport, plan_of(&[1, 2, 3]), FetchOptions::new(dir.path()));
        let (mut fetched, failed) = drain(&mut stream).await;
        fetched.sort();
        assert_eq!(fetched, vec![1, 3]);
        assert_eq!(failed, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn works_as_a_stream() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let stream = fetch_all(transport, plan_of(&[1, 2]), FetchOptions::new(dir.path()));
        let fetched: Vec<_> = stream
            .filter_map(|e| match e {
                FetchEvent::Fetched(f) => Some(f.path),
                _ => None,
            })
            .collect()
            .await;
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|p| p.exists()));
    }
}

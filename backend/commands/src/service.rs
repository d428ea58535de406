//! The zip workflow behind the chat commands.
//!
//! Collecting goes through the task registry. Finalizing plans the fetch,
//! streams completed downloads straight into the archive, uploads it, and
//! always hands the task back to the registry for teardown.

use std::path::Path;
use std::sync::Arc;

use quickzip_core::{
    admit_within, ArchiveError, Direction, NoopObserver, PayloadTransport, ProgressObserver,
    QuickZipError, RemoteRef, SessionId,
};
use quickzip_logging::{TaskEvent, TaskEventLogger};
use quickzip_media::archive::{self, ArchiveFormat};
use quickzip_media::{
    fetch_all, plan_fetch, FetchEvent, FetchOptions, GroupResolver, OmittedMember, TransferUnit,
    DEFAULT_CONCURRENCY,
};
use quickzip_tasks::{discard_dir, Begun, FinalizeTicket, ListedFile, TaskRegistry};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Caption of the uploaded archive.
pub const DONE_CAPTION: &str = "Done!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    pub archive_name: String,
    pub archived: usize,
    pub omitted: Vec<OmittedMember>,
    /// Albums that may have had members beyond the scan window.
    pub truncated_groups: Vec<String>,
    pub uploaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub archive_name: String,
    pub delivered: usize,
    pub failed: Vec<OmittedMember>,
}

pub struct ZipService {
    registry: TaskRegistry,
    resolver: GroupResolver,
    transport: Arc<dyn PayloadTransport>,
    observer: Arc<dyn ProgressObserver>,
    events: TaskEventLogger,
    concurrency: usize,
}

impl ZipService {
    pub fn new(
        registry: TaskRegistry,
        resolver: GroupResolver,
        transport: Arc<dyn PayloadTransport>,
    ) -> Self {
        Self {
            registry,
            resolver,
            transport,
            observer: Arc::new(NoopObserver),
            events: TaskEventLogger,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub async fn on_begin(&self, session: SessionId) -> Result<Begun, QuickZipError> {
        let begun = self.registry.begin(session).await?;
        self.events.log(session.0, TaskEvent::Begun);
        Ok(begun)
    }

    /// Offer a payload-bearing post to the session's task. Returns the new
    /// committed size.
    pub async fn on_payload_reference(
        &self,
        session: SessionId,
        reference: RemoteRef,
    ) -> Result<u64, QuickZipError> {
        let (message_id, size) = (reference.id, reference.payload_size());
        match self.registry.try_append(session, reference).await {
            Ok(committed) => {
                self.events.log(session.0, TaskEvent::Accepted { message_id, size, committed });
                Ok(committed)
            }
            Err(QuickZipError::Admission(rejection)) => {
                self.events.log(
                    session.0,
                    TaskEvent::Rejected {
                        message_id,
                        size,
                        committed: rejection.committed,
                    },
                );
                Err(QuickZipError::Admission(rejection))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn on_list(&self, session: SessionId) -> Result<Vec<ListedFile>, QuickZipError> {
        self.registry.list(session).await
    }

    /// Drop the session's task, stopping a finalize in progress. Returns
    /// false when there was nothing to cancel.
    pub async fn on_cancel(&self, session: SessionId) -> bool {
        let cancelled = self.registry.cancel(session).await;
        if cancelled {
            self.events.log(session.0, TaskEvent::Cancelled);
        }
        cancelled
    }

    /// Fetch every collected payload, pack them into `<archive_name>.zip`,
    /// and upload it. The task and its directory are gone when this returns,
    /// whatever the outcome.
    pub async fn on_finalize(
        &self,
        session: SessionId,
        archive_name: &str,
    ) -> Result<FinalizeReport, QuickZipError> {
        let ticket = self.registry.start_finalize(session).await?;
        let span = info_span!("finalize", session = %session, run_id = %Uuid::new_v4());

        let outcome = async {
            tokio::select! {
                _ = ticket.cancelled() => Err(QuickZipError::Cancelled),
                result = self.run_finalize(&ticket, archive_name) => result,
            }
        }
        .instrument(span)
        .await;

        self.registry.finish(ticket).await;

        match &outcome {
            Ok(report) => {
                self.events.log(
                    session.0,
                    TaskEvent::Finalized {
                        archive: report.archive_name.clone(),
                        files: report.archived,
                        omitted: report.omitted.len(),
                    },
                );
            }
            Err(QuickZipError::Cancelled) => info!(session = %session, "Finalize stopped by cancel"),
            Err(e) => {
                self.events.log(session.0, TaskEvent::Failed { error: e.to_string() });
            }
        }
        outcome
    }

    async fn run_finalize(
        &self,
        ticket: &FinalizeTicket,
        archive_name: &str,
    ) -> Result<FinalizeReport, QuickZipError> {
        let plan = plan_fetch(&self.resolver, &ticket.references).await?;
        plan.check_size(self.registry.max_bytes())?;
        if plan.is_empty() {
            return Err(QuickZipError::EmptyTask);
        }

        let parts = ticket.workdir.join("parts");
        tokio::fs::create_dir_all(&parts).await?;
        let archive_file = format!("{archive_name}.zip");
        let archive_path = ticket.workdir.join(&archive_file);

        info!(
            members = plan.member_count(),
            bytes = plan.total_bytes,
            concurrency = self.concurrency,
            "Fetching task payloads"
        );
        let truncated_groups = plan.truncated_groups.clone();
        let options = FetchOptions::new(&parts).with_concurrency(self.concurrency);
        let mut stream = fetch_all(self.transport.clone(), plan, options);

        let mut archived = 0;
        let mut omitted = Vec::new();
        while let Some(event) = stream.next().await {
            match event {
                FetchEvent::Started { name, progress, .. } => {
                    self.observer
                        .observe(ticket.session, Direction::Download, &name, progress);
                }
                FetchEvent::Fetched(file) => {
                    archive::append_async(archive_path.clone(), file.path).await?;
                    archived += 1;
                }
                FetchEvent::Failed(member) => {
                    self.events.log(
                        ticket.session.0,
                        TaskEvent::Omitted {
                            name: member.name.clone(),
                            reason: member.error.to_string(),
                        },
                    );
                    omitted.push(member);
                }
            }
        }

        let mut report = FinalizeReport {
            archive_name: archive_file,
            archived,
            omitted,
            truncated_groups,
            uploaded: false,
        };
        if archived == 0 {
            warn!("No payload could be fetched; nothing to upload");
            return Ok(report);
        }

        let size = tokio::fs::metadata(&archive_path).await?.len();
        let unit = TransferUnit::upload(
            self.transport.clone(),
            ticket.session,
            archive_path,
            DONE_CAPTION.to_string(),
            size,
        );
        self.observer
            .observe(ticket.session, Direction::Upload, unit.name(), unit.progress());
        unit.outcome().await?;

        info!(archive = %report.archive_name, files = archived, bytes = size, "Archive delivered");
        report.uploaded = true;
        Ok(report)
    }

    /// Download the archive in `archive`, unpack it, and send every member
    /// back to the chat one at a time. The scratch directory is removed on
    /// every path.
    pub async fn on_extract(
        &self,
        session: SessionId,
        archive: RemoteRef,
    ) -> Result<ExtractReport, QuickZipError> {
        let file_name = archive.local_file_name();
        if !archive.is_fetchable() {
            return Err(ArchiveError::UnsupportedFormat(file_name).into());
        }
        ArchiveFormat::from_path(Path::new(&file_name))?;
        admit_within(0, archive.payload_size(), self.registry.max_bytes()).into_result()?;

        let scratch = self.registry.workdirs().extraction_path(session);
        let span = info_span!("extract", session = %session, run_id = %Uuid::new_v4());
        let outcome = self.run_extract(session, archive, &scratch).instrument(span).await;
        discard_dir(&scratch).await;

        match &outcome {
            Ok(report) => {
                self.events.log(
                    session.0,
                    TaskEvent::Extracted {
                        archive: report.archive_name.clone(),
                        files: report.delivered,
                    },
                );
            }
            Err(e) => {
                self.events.log(session.0, TaskEvent::Failed { error: e.to_string() });
            }
        }
        outcome
    }

    async fn run_extract(
        &self,
        session: SessionId,
        archive: RemoteRef,
        scratch: &Path,
    ) -> Result<ExtractReport, QuickZipError> {
        let archive_id = archive.id;
        let target = scratch.join(archive.local_file_name());
        let download = TransferUnit::download(self.transport.clone(), archive, target);
        self.observer
            .observe(session, Direction::Download, download.name(), download.progress());
        let archive_name = download.name().to_string();
        let archive_path = download.outcome().await?;

        let members = archive::extract_all_async(archive_path, scratch.join("members")).await?;
        info!(archive = %archive_name, members = members.len(), "Archive extracted");

        let mut report = ExtractReport {
            archive_name,
            delivered: 0,
            failed: Vec::new(),
        };
        for member in members {
            let size = tokio::fs::metadata(&member).await?.len();
            let unit = TransferUnit::upload(self.transport.clone(), session, member, String::new(), size);
            self.observer
                .observe(session, Direction::Upload, unit.name(), unit.progress());
            let name = unit.name().to_string();
            match unit.outcome().await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(file = %name, error = %error, "Failed to deliver extracted file");
                    report.failed.push(OmittedMember {
                        name,
                        message_id: archive_id,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickzip_core::TransferError;
    use quickzip_media::testing::{named_post, post, FakeMessageSource, FakeTransport};
    use quickzip_tasks::WorkDirs;
    use std::io::{Cursor, Read, Write};
    use std::time::Duration;

    struct Harness {
        service: Arc<ZipService>,
        transport: Arc<FakeTransport>,
        root: tempfile::TempDir,
    }

    fn harness(source: FakeMessageSource, transport: FakeTransport) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport);
        let registry = TaskRegistry::new(WorkDirs::new(root.path()));
        let resolver = GroupResolver::new(Arc::new(source));
        let service = ZipService::new(registry, resolver, transport.clone());
        Harness {
            service: Arc::new(service),
            transport,
            root,
        }
    }

    fn zip_entries(body: &[u8]) -> Vec<String> {
        let zip = zip::ZipArchive::new(Cursor::new(body.to_vec())).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn three_files_become_one_archive_and_cleanup_runs() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default());
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        for (id, size) in [(1, 200_000_000), (2, 150_000_000), (3, 150_000_000)] {
            h.service.on_payload_reference(s, post(id, None, Some(size))).await.unwrap();
        }

        let report = h.service.on_finalize(s, "bundle").await.unwrap();
        assert_eq!(report.archived, 3);
        assert!(report.uploaded);
        assert!(report.omitted.is_empty());

        let uploads = h.transport.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, s);
        assert!(uploads[0].1.ends_with("bundle.zip"));
        assert_eq!(uploads[0].2, DONE_CAPTION);
        assert_eq!(
            zip_entries(&h.transport.upload_bodies()[0]),
            vec!["f1.bin", "f2.bin", "f3.bin"]
        );

        assert!(!h.service.registry().contains(s).await);
        assert!(!h.root.path().join("7").exists());
    }

    #[tokio::test]
    async fn finalize_requires_a_task_with_files() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default());
        let s = SessionId(7);
        assert!(matches!(h.service.on_finalize(s, "x").await, Err(QuickZipError::NoTask)));
        h.service.on_begin(s).await.unwrap();
        assert!(matches!(h.service.on_finalize(s, "x").await, Err(QuickZipError::EmptyTask)));
    }

    #[tokio::test]
    async fn album_expansion_past_the_ceiling_is_rejected_and_cleaned_up() {
        let album: Vec<_> = (1..=3).map(|id| post(id, Some("g"), Some(900_000_000))).collect();
        let h = harness(FakeMessageSource::with(album.clone()), FakeTransport::default());
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, album[0].clone()).await.unwrap();

        let err = h.service.on_finalize(s, "big").await.unwrap_err();
        assert!(matches!(err, QuickZipError::Admission(_)));
        assert!(h.transport.uploads().is_empty());
        assert!(!h.service.registry().contains(s).await);
    }

    #[tokio::test]
    async fn resolution_failure_aborts_and_cleans_up() {
        let h = harness(FakeMessageSource::failing(), FakeTransport::default());
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, post(4, Some("g"), Some(10))).await.unwrap();

        let err = h.service.on_finalize(s, "x").await.unwrap_err();
        assert!(matches!(err, QuickZipError::Resolution { message_id: 4, .. }));
        assert!(!h.service.registry().contains(s).await);
        assert!(!h.root.path().join("7").exists());
    }

    #[tokio::test]
    async fn failed_download_is_listed_as_omitted() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default().with_failure(2));
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        for id in 1..=3 {
            h.service.on_payload_reference(s, post(id, None, Some(10))).await.unwrap();
        }

        let report = h.service.on_finalize(s, "partial").await.unwrap();
        assert_eq!(report.archived, 2);
        assert_eq!(report.omitted.len(), 1);
        assert_eq!(report.omitted[0].name, "f2.bin");
        assert!(matches!(report.omitted[0].error, TransferError::RemoteGone(_)));
        assert_eq!(zip_entries(&h.transport.upload_bodies()[0]), vec!["f1.bin", "f3.bin"]);
    }

    #[tokio::test]
    async fn distinct_files_with_one_name_are_all_archived() {
        let transport = FakeTransport::default()
            .with_content(1, "first")
            .with_content(2, "second");
        let h = harness(FakeMessageSource::default(), transport);
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, named_post(1, "report.pdf", 5)).await.unwrap();
        h.service.on_payload_reference(s, named_post(2, "report.pdf", 6)).await.unwrap();

        let report = h.service.on_finalize(s, "bundle").await.unwrap();
        assert_eq!(report.archived, 2);
        assert!(report.omitted.is_empty());

        let body = &h.transport.upload_bodies()[0];
        assert_eq!(zip_entries(body), vec!["report (1).pdf", "report.pdf"]);
        let mut zip = zip::ZipArchive::new(Cursor::new(body.clone())).unwrap();
        let mut contents = Vec::new();
        for name in ["report.pdf", "report (1).pdf"] {
            let mut text = String::new();
            zip.by_name(name).unwrap().read_to_string(&mut text).unwrap();
            contents.push(text);
        }
        contents.sort();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn nothing_fetched_means_nothing_uploaded() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default().with_failure(1));
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, post(1, None, Some(10))).await.unwrap();
        let report = h.service.on_finalize(s, "empty").await.unwrap();
        assert!(!report.uploaded);
        assert!(h.transport.uploads().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_is_terminal_but_cleans_up() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default().with_failing_uploads());
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, post(1, None, Some(10))).await.unwrap();
        let err = h.service.on_finalize(s, "x").await.unwrap_err();
        assert!(matches!(err, QuickZipError::Transfer(TransferError::Network(_))));
        assert!(!h.root.path().join("7").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_finalize_stops_everything() {
        let mut transport = FakeTransport::default().with_delay(1, Duration::from_secs(1));
        for id in 2..=5 {
            transport = transport.with_delay(id, Duration::from_secs(30));
        }
        let h = harness(FakeMessageSource::default(), transport);
        let service = h.service.clone();
        let s = SessionId(7);
        service.on_begin(s).await.unwrap();
        for id in 1..=5 {
            service.on_payload_reference(s, post(id, None, Some(10))).await.unwrap();
        }

        let running = tokio::spawn({
            let service = service.clone();
            async move { service.on_finalize(s, "x").await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(service.on_cancel(s).await);

        let outcome = running.await.unwrap();
        assert!(matches!(outcome, Err(QuickZipError::Cancelled)));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.transport.completed() < 5);
        assert!(h.transport.uploads().is_empty());
        assert!(!h.root.path().join("7").exists());
        assert!(!service.registry().contains(s).await);
    }

    #[tokio::test]
    async fn over_limit_reference_is_rejected_without_changing_the_task() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default());
        let s = SessionId(7);
        h.service.on_begin(s).await.unwrap();
        h.service.on_payload_reference(s, post(1, None, Some(1_999_999_999))).await.unwrap();
        let err = h.service.on_payload_reference(s, post(2, None, Some(2))).await.unwrap_err();
        assert!(matches!(err, QuickZipError::Admission(_)));
        let listed = h.service.on_list(s).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn archive_post(id: i32, name: &str) -> RemoteRef {
        let mut r = post(id, None, Some(100));
        if let Some(a) = r.attachment.as_mut() {
            a.name = Some(name.to_string());
        }
        r
    }

    #[tokio::test]
    async fn extract_redelivers_each_member_and_removes_scratch() {
        let body = zip_with(&[("a/one.txt", "1"), ("two.txt", "2")]);
        let h = harness(FakeMessageSource::default(), FakeTransport::default().with_content(9, body));
        let s = SessionId(7);

        let report = h.service.on_extract(s, archive_post(9, "stuff.zip")).await.unwrap();
        assert_eq!(report.delivered, 2);
        let names: Vec<_> = h
            .transport
            .uploads()
            .iter()
            .map(|(_, p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["one.txt", "two.txt"]);
        assert_eq!(h.transport.upload_bodies(), vec![b"1".to_vec(), b"2".to_vec()]);

        let extract_root = h.root.path().join("extract");
        let leftovers = std::fs::read_dir(&extract_root)
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn extract_rejects_unknown_formats_before_downloading() {
        let h = harness(FakeMessageSource::default(), FakeTransport::default());
        let err = h
            .service
            .on_extract(SessionId(7), archive_post(9, "photo.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuickZipError::Archive(ArchiveError::UnsupportedFormat(_))));
        assert_eq!(h.transport.completed(), 0);
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_archive_error() {
        let h = harness(
            FakeMessageSource::default(),
            FakeTransport::default().with_content(9, b"garbage".to_vec()),
        );
        let err = h
            .service
            .on_extract(SessionId(7), archive_post(9, "bad.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuickZipError::Archive(ArchiveError::Format { .. })));
        assert!(h.transport.uploads().is_empty());
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use relay_core::{Clock, FileRecord};
use relay_repository::{ActivityCursor, FileRepository};
use relay_storage::FileStorage;

use crate::config::GcConfig;
use crate::error::GcError;

/// Whether a sweep is currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    Idle,
    Sweeping,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records removed from both storage and the repository.
    pub deleted: usize,
    /// Records that could not be removed and remain candidates.
    pub failed: usize,
    /// Pages fetched from the repository.
    pub pages: usize,
}

/// Resets the sweeping flag when a sweep ends, even on early return.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Evicts files whose last activity is older than the configured threshold.
pub struct GarbageCollector {
    repository: Arc<dyn FileRepository>,
    storage: Arc<dyn FileStorage>,
    clock: Arc<dyn Clock>,
    config: GcConfig,
    sweeping: AtomicBool,
}

impl GarbageCollector {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
        config: GcConfig,
    ) -> Self {
        Self {
            repository,
            storage,
            clock,
            config,
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> GcState {
        if self.sweeping.load(Ordering::Acquire) {
            GcState::Sweeping
        } else {
            GcState::Idle
        }
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Run one sweep over every record inactive since `now - inactive_after`.
    ///
    /// Candidates are paged oldest first behind a cursor, so a record that
    /// fails to evict never hides the ones after it. Individual record
    /// failures are logged and counted; only a failure to list candidates
    /// aborts the sweep. A sweep that overlaps another one
    /// returns an empty report immediately.
    pub async fn sweep(&self) -> Result<SweepReport, GcError> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sweep already in progress, skipping");
            return Ok(SweepReport::default());
        }
        let _guard = SweepGuard(&self.sweeping);

        let cutoff = self.clock.now() - self.config.inactive_after;
        let page_size = self.config.page_size.max(1);
        let mut report = SweepReport::default();
        let mut cursor: Option<ActivityCursor> = None;

        loop {
            let page = self
                .repository
                .list_inactive_after(cutoff, cursor.as_ref(), page_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            report.pages += 1;
            // Records that fail stay behind the cursor and wait for the next sweep.
            cursor = Some(ActivityCursor::from(last));

            let outcomes = join_all(page.iter().map(|record| self.evict(record))).await;
            let deleted = outcomes.into_iter().filter(|evicted| *evicted).count();
            report.deleted += deleted;
            report.failed += page.len() - deleted;
        }

        Ok(report)
    }

    async fn evict(&self, record: &FileRecord) -> bool {
        if let Err(e) = self.storage.delete(&record.storage_path).await {
            warn!(
                public_key = %record.public_key,
                error = %e,
                "failed to delete stored file"
            );
            return false;
        }

        match self.repository.delete(&record.private_key).await {
            Ok(Some(_)) => {
                debug!(public_key = %record.public_key, "evicted inactive file");
                true
            }
            // Deleted by its owner between listing and eviction.
            Ok(None) => true,
            Err(e) => {
                warn!(
                    public_key = %record.public_key,
                    error = %e,
                    "failed to delete file record"
                );
                false
            }
        }
    }

    /// Spawn the schedule loop.
    pub fn start(self: Arc<Self>) -> GcHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        GcHandle { shutdown_tx, task }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("garbage collector starting");

        loop {
            let Some(delay) = self.config.schedule.delay_after(self.clock.now()) else {
                warn!("garbage collection schedule has no future occurrence");
                break;
            };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("garbage collector received shutdown signal");
                    break;
                }
                () = tokio::time::sleep(delay) => {
                    match self.sweep().await {
                        Ok(report) => info!(
                            deleted = report.deleted,
                            failed = report.failed,
                            pages = report.pages,
                            "garbage collection sweep finished"
                        ),
                        Err(e) => error!(error = %e, "garbage collection sweep failed"),
                    }
                }
            }
        }

        info!("garbage collector stopped");
    }
}

/// Handle to a running collector.
#[derive(Debug)]
pub struct GcHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl GcHandle {
    /// Signal shutdown and wait for the loop to exit. A sweep in progress is
    /// allowed to finish.
    pub async fn stop(self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("garbage collector task already ended");
        }
        if let Err(e) = self.task.await {
            error!(error = %e, "garbage collector task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use relay_core::{ManualClock, NewFileRecord, generate_key};
    use relay_repository_memory::MemoryFileRepository;
    use relay_storage::{ByteStream, StorageError};
    use relay_storage_local::LocalFileStorage;

    use crate::config::Schedule;

    use super::*;

    /// Storage wrapper whose deletes fail for selected keys.
    struct FailingStorage {
        inner: LocalFileStorage,
        poisoned: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl FileStorage for FailingStorage {
        async fn put(&self, source: &Path) -> Result<String, StorageError> {
            self.inner.put(source).await
        }

        async fn load(&self, key: &str) -> Result<ByteStream, StorageError> {
            self.inner.load(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            if self.poisoned.lock().unwrap().contains(key) {
                return Err(StorageError::BackendUnavailable("injected".into()));
            }
            self.inner.delete(key).await
        }

        async fn is_live(&self) -> bool {
            true
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        scratch: tempfile::TempDir,
        clock: Arc<ManualClock>,
        repository: Arc<MemoryFileRepository>,
        storage: Arc<FailingStorage>,
    }

    impl Fixture {
        async fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let inner = LocalFileStorage::new(root.path());
            inner.init().await.unwrap();
            let clock = Arc::new(ManualClock::starting_now());
            Self {
                _root: root,
                scratch: tempfile::tempdir().unwrap(),
                repository: Arc::new(MemoryFileRepository::new(
                    Arc::clone(&clock) as Arc<dyn Clock>
                )),
                clock,
                storage: Arc::new(FailingStorage {
                    inner,
                    poisoned: Mutex::new(HashSet::new()),
                }),
            }
        }

        fn collector(&self, config: GcConfig) -> Arc<GarbageCollector> {
            Arc::new(GarbageCollector::new(
                Arc::clone(&self.repository) as Arc<dyn FileRepository>,
                Arc::clone(&self.storage) as Arc<dyn FileStorage>,
                Arc::clone(&self.clock) as Arc<dyn Clock>,
                config,
            ))
        }

        /// Store a file and its record, returning the record.
        async fn upload(&self, content: &[u8]) -> FileRecord {
            let source = self.scratch.path().join(generate_key());
            tokio::fs::write(&source, content).await.unwrap();
            let storage_path = self.storage.put(&source).await.unwrap();
            self.repository
                .add(NewFileRecord {
                    public_key: generate_key(),
                    private_key: generate_key(),
                    storage_path,
                    mime_type: "text/plain".into(),
                    size: content.len() as u64,
                })
                .await
                .unwrap()
        }

        async fn stored(&self, record: &FileRecord) -> bool {
            match self.storage.load(&record.storage_path).await {
                Ok(_) => true,
                Err(StorageError::NotFound(_)) => false,
                Err(e) => panic!("unexpected storage error: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn evicts_files_idle_past_threshold() {
        let fx = Fixture::new().await;
        let old = fx.upload(b"old").await;
        fx.clock.advance(TimeDelta::days(20));
        let fresh = fx.upload(b"fresh").await;

        let report = fx.collector(GcConfig::default()).sweep().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);
        assert!(fx.repository.get(&old.public_key).await.unwrap().is_none());
        assert!(!fx.stored(&old).await);
        assert!(fx.repository.get(&fresh.public_key).await.unwrap().is_some());
        assert!(fx.stored(&fresh).await);
    }

    #[tokio::test]
    async fn download_activity_keeps_file_alive() {
        let fx = Fixture::new().await;
        let record = fx.upload(b"busy").await;

        fx.clock.advance(TimeDelta::days(10));
        fx.repository.get(&record.public_key).await.unwrap();
        fx.clock.advance(TimeDelta::days(10));

        let report = fx.collector(GcConfig::default()).sweep().await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(fx.stored(&record).await);
    }

    #[tokio::test]
    async fn sweeps_across_pages() {
        let fx = Fixture::new().await;
        for n in 0..7u8 {
            fx.upload(&[n]).await;
        }
        fx.clock.advance(TimeDelta::days(15));

        let config = GcConfig {
            page_size: 3,
            ..GcConfig::default()
        };
        let report = fx.collector(config).sweep().await.unwrap();
        assert_eq!(report.deleted, 7);
        assert_eq!(report.pages, 3);
        assert!(fx.repository.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_does_not_abort_sweep() {
        let fx = Fixture::new().await;
        let stuck = fx.upload(b"stuck").await;
        let others = [fx.upload(b"a").await, fx.upload(b"b").await];
        fx.storage
            .poisoned
            .lock()
            .unwrap()
            .insert(stuck.storage_path.clone());
        fx.clock.advance(TimeDelta::days(30));

        let report = fx.collector(GcConfig::default()).sweep().await.unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.pages, 1);
        for record in &others {
            assert!(fx.repository.get(&record.public_key).await.unwrap().is_none());
        }
        // Metadata survives so the file is retried next time.
        assert!(fx.repository.get(&stuck.public_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failing_page_does_not_hide_later_candidates() {
        let fx = Fixture::new().await;
        let mut poisoned = HashSet::new();
        let mut stuck = Vec::new();
        for n in 0..2u8 {
            let record = fx.upload(&[n]).await;
            poisoned.insert(record.storage_path.clone());
            stuck.push(record);
        }
        // Healthy records are younger, so they sort after the failing page.
        fx.clock.advance(TimeDelta::seconds(1));
        let healthy = [fx.upload(b"c").await, fx.upload(b"d").await];
        *fx.storage.poisoned.lock().unwrap() = poisoned;
        fx.clock.advance(TimeDelta::days(30));

        let config = GcConfig {
            page_size: 2,
            ..GcConfig::default()
        };
        let gc = fx.collector(config);
        let report = tokio::time::timeout(Duration::from_secs(1), gc.sweep())
            .await
            .expect("sweep should terminate")
            .unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.pages, 2);
        for record in &healthy {
            assert!(fx.repository.get(&record.public_key).await.unwrap().is_none());
            assert!(!fx.stored(record).await);
        }
        for record in &stuck {
            assert!(fx.stored(record).await);
        }
        assert_eq!(fx.repository.len(), 2);
    }

    #[tokio::test]
    async fn failed_records_are_retried_by_the_next_sweep() {
        let fx = Fixture::new().await;
        let record = fx.upload(b"flaky").await;
        fx.storage
            .poisoned
            .lock()
            .unwrap()
            .insert(record.storage_path.clone());
        fx.clock.advance(TimeDelta::days(30));
        let gc = fx.collector(GcConfig::default());

        let first = gc.sweep().await.unwrap();
        assert_eq!((first.deleted, first.failed), (0, 1));

        fx.storage.poisoned.lock().unwrap().clear();
        let second = gc.sweep().await.unwrap();
        assert_eq!((second.deleted, second.failed), (1, 0));
        assert!(fx.repository.is_empty());
    }

    #[tokio::test]
    async fn state_returns_to_idle() {
        let fx = Fixture::new().await;
        let gc = fx.collector(GcConfig::default());
        assert_eq!(gc.state(), GcState::Idle);
        gc.sweep().await.unwrap();
        assert_eq!(gc.state(), GcState::Idle);
    }

    #[tokio::test]
    async fn stop_after_task_ended_returns() {
        let fx = Fixture::new().await;
        let handle = fx.collector(GcConfig::default()).start();
        handle.task.abort();
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop should not hang on an ended task");
    }

    #[tokio::test]
    async fn scheduled_loop_sweeps_and_stops() {
        let fx = Fixture::new().await;
        let record = fx.upload(b"scheduled").await;
        fx.clock.advance(TimeDelta::days(15));

        let config = GcConfig {
            schedule: Schedule::Interval(Duration::from_millis(20)),
            ..GcConfig::default()
        };
        let handle = fx.collector(config).start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fx.repository.get(&record.public_key).await.unwrap().is_none());
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("collector should stop promptly");
    }
}

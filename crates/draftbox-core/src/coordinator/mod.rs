//! Download coordinator: owns every task record and dispatches transfer workers.
//!
//! One mutex guards the record map. Caller operations, worker progress and
//! worker completion all take it, and every event is emitted while it is held,
//! so per-task events leave in the same order the record changed. Terminal
//! snapshots are also queued, without loss, to every `subscribe_terminal`
//! receiver. Workers run on their own OS threads; nothing here blocks on
//! network or disk I/O except `shutdown`, which joins them, and the final
//! rename of a finished archive.

mod error;
mod events;
mod worker;

pub use error::CoordinatorError;
pub use events::{TaskEvent, TaskSubscription};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::config::DraftboxConfig;
use crate::control::TransferControl;
use crate::source::{ArchiveSource, SourceError, TemplateSource};
use crate::storage::part_path;
use crate::task::{TaskId, TaskRecord, TaskStatus};
use crate::transfer::{TransferOptions, TransferRequest};

/// Coordinator tuning, usually built from `DraftboxConfig`.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub transfer: TransferOptions,
    /// Events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            transfer: TransferOptions::default(),
            event_capacity: 1024,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(cfg: &DraftboxConfig) -> Self {
        Self {
            transfer: TransferOptions::from_config(
                cfg.transfer.as_ref(),
                Duration::from_millis(cfg.progress_interval_ms),
            ),
            event_capacity: cfg.event_capacity,
        }
    }
}

/// Result of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new record was queued and a worker dispatched.
    Started,
    /// The id already has a queued, downloading or paused task; nothing changed.
    AlreadyActive,
}

/// What a caller operation does to a record.
enum Effect {
    Unchanged,
    Transition,
    Rejected,
}

struct Entry {
    record: TaskRecord,
    /// Distinguishes restarts of the same id; stale workers only clean up after themselves.
    run: u64,
    url: String,
    /// Present while a worker holds a reference to this record.
    control: Option<Arc<TransferControl>>,
}

struct Shared {
    tasks: Mutex<HashMap<TaskId, Entry>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<TaskEvent>,
    terminal: Mutex<Vec<mpsc::UnboundedSender<TaskRecord>>>,
    source: Box<dyn ArchiveSource>,
    options: TransferOptions,
    next_run: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, Entry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort fan-out; having no subscribers is fine. Terminal status
    /// snapshots additionally go to the lossless terminal queues.
    fn emit(&self, event: TaskEvent) {
        if let TaskEvent::Status { record } = &event {
            if record.status.is_terminal() {
                let mut queues = self.terminal.lock().unwrap_or_else(PoisonError::into_inner);
                queues.retain(|tx| tx.send(record.clone()).is_ok());
            }
        }
        let _ = self.events.send(event);
    }
}

/// Handle to the coordinator. Clones share the same tasks and workers.
#[derive(Clone)]
pub struct DownloadCoordinator {
    shared: Arc<Shared>,
}

impl DownloadCoordinator {
    pub fn new(source: impl ArchiveSource + 'static, options: CoordinatorOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                tasks: Mutex::new(HashMap::new()),
                workers: Mutex::new(Vec::new()),
                events,
                terminal: Mutex::new(Vec::new()),
                source: Box::new(source),
                options: options.transfer,
                next_run: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Coordinator fetching from the configured archive URL template.
    pub fn from_config(cfg: &DraftboxConfig) -> Result<Self, SourceError> {
        let source = TemplateSource::new(cfg.archive_url_template.clone())?;
        Ok(Self::new(source, CoordinatorOptions::from_config(cfg)))
    }

    /// Queues a download of draft `id` into `destination` and dispatches a worker.
    /// Returns immediately. A terminal record for the same id is replaced.
    pub fn start(
        &self,
        id: &str,
        destination: impl Into<PathBuf>,
    ) -> Result<StartOutcome, CoordinatorError> {
        let id = TaskId::parse(id)?;
        let url = self.shared.source.archive_url(&id)?;
        let destination = destination.into();

        let mut tasks = self.shared.tasks();
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(CoordinatorError::ShutDown);
        }
        if let Some(entry) = tasks.get(&id) {
            if !entry.record.status.is_terminal() {
                tracing::debug!(%id, status = %entry.record.status, "start ignored; task active");
                return Ok(StartOutcome::AlreadyActive);
            }
        }

        let run = self.shared.next_run.fetch_add(1, Ordering::SeqCst);
        let control = Arc::new(TransferControl::new());
        let request = TransferRequest {
            url: url.clone(),
            part_path: part_path(&destination, &id, run),
            options: self.shared.options.clone(),
        };
        let record = TaskRecord::new(id.clone(), destination);

        let spawned = {
            let shared = Arc::clone(&self.shared);
            let control = Arc::clone(&control);
            let id = id.clone();
            thread::Builder::new()
                .name(format!("draftbox-{}", id))
                .spawn(move || worker::run(&shared, &id, run, &request, &control))
        };
        let handle = spawned.map_err(CoordinatorError::Spawn)?;

        tracing::info!(%id, %url, destination = %record.destination.display(), "download queued");
        self.shared.emit(TaskEvent::Status {
            record: record.clone(),
        });
        tasks.insert(
            id,
            Entry {
                record,
                run,
                url,
                control: Some(control),
            },
        );

        // Registered before the tasks lock is released so `shutdown` always joins it.
        let mut workers = self.shared.workers();
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
        Ok(StartOutcome::Started)
    }

    /// Suspends a queued or downloading task. The connection stays open and
    /// `bytes_done` is frozen at what is on disk when this returns.
    pub fn pause(&self, id: &str) -> Result<(), CoordinatorError> {
        self.signal(id, "pause", TaskStatus::Paused, |entry| match entry.record.status {
            TaskStatus::Paused => Effect::Unchanged,
            TaskStatus::Queued | TaskStatus::Downloading => {
                if let Some(control) = &entry.control {
                    // No chunk lands after this until resume, so the count is final.
                    let written = control.pause();
                    entry.record.advance(written);
                }
                Effect::Transition
            }
            _ => Effect::Rejected,
        })
    }

    /// Continues a paused task from where it stopped.
    pub fn resume(&self, id: &str) -> Result<(), CoordinatorError> {
        self.signal(id, "resume", TaskStatus::Downloading, |entry| {
            match entry.record.status {
                TaskStatus::Downloading => Effect::Unchanged,
                TaskStatus::Paused => {
                    if let Some(control) = &entry.control {
                        control.resume();
                    }
                    Effect::Transition
                }
                _ => Effect::Rejected,
            }
        })
    }

    /// Stops a task and discards its partial output. The record becomes
    /// Cancelled immediately; `Released` follows once the part file is gone.
    pub fn cancel(&self, id: &str) -> Result<(), CoordinatorError> {
        self.signal(id, "cancel", TaskStatus::Cancelled, |entry| {
            match entry.record.status {
                TaskStatus::Cancelled => Effect::Unchanged,
                TaskStatus::Queued | TaskStatus::Downloading | TaskStatus::Paused => {
                    if let Some(control) = &entry.control {
                        control.cancel();
                    }
                    Effect::Transition
                }
                TaskStatus::Completed | TaskStatus::Failed => Effect::Rejected,
            }
        })
    }

    /// Looks up `id` under the lock, lets `apply` signal the worker, then moves
    /// the record to `target` and emits the new snapshot.
    fn signal(
        &self,
        id: &str,
        action: &'static str,
        target: TaskStatus,
        apply: impl FnOnce(&mut Entry) -> Effect,
    ) -> Result<(), CoordinatorError> {
        let unknown = || CoordinatorError::UnknownIdentifier(id.to_string());
        let key = TaskId::parse(id).map_err(|_| unknown())?;
        let mut tasks = self.shared.tasks();
        let entry = tasks.get_mut(&key).ok_or_else(unknown)?;
        let rejected = |status| CoordinatorError::InvalidState {
            id: key.clone(),
            status,
            action,
        };
        match apply(&mut *entry) {
            Effect::Unchanged => Ok(()),
            Effect::Rejected => Err(rejected(entry.record.status)),
            Effect::Transition => {
                entry.record.transition(target).map_err(rejected)?;
                tracing::info!(id = %key, status = %target, "download {}", action);
                self.shared.emit(TaskEvent::Status {
                    record: entry.record.clone(),
                });
                Ok(())
            }
        }
    }

    /// Snapshot of one record.
    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        let key = TaskId::parse(id).ok()?;
        self.shared.tasks().get(&key).map(|e| e.record.clone())
    }

    /// Snapshot of every record, oldest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .shared
            .tasks()
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Drops a terminal record whose worker has been released.
    pub fn forget(&self, id: &str) -> Result<TaskRecord, CoordinatorError> {
        let unknown = || CoordinatorError::UnknownIdentifier(id.to_string());
        let key = TaskId::parse(id).map_err(|_| unknown())?;
        let mut tasks = self.shared.tasks();
        let entry = tasks.get(&key).ok_or_else(unknown)?;
        if !entry.record.status.is_terminal() || entry.control.is_some() {
            return Err(CoordinatorError::InvalidState {
                id: key,
                status: entry.record.status,
                action: "forget",
            });
        }
        let entry = tasks.remove(&key).ok_or_else(unknown)?;
        Ok(entry.record)
    }

    /// Every terminal (Completed, Failed, Cancelled) snapshot from now on.
    /// Unlike `subscribe`, nothing is dropped; the queue is unbounded.
    pub fn subscribe_terminal(&self) -> mpsc::UnboundedReceiver<TaskRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .terminal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// All events for all tasks.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.shared.events.subscribe()
    }

    /// Events for one task. Subscribe before `start` to see the whole run.
    pub fn subscribe_task(&self, id: &str) -> TaskSubscription {
        TaskSubscription::new(id, self.shared.events.subscribe())
    }

    /// Cancels every unfinished task and joins all worker threads.
    /// Blocks until the workers have cleaned up; later `start` calls fail.
    pub fn shutdown(&self) {
        {
            let mut tasks = self.shared.tasks();
            self.shared.closed.store(true, Ordering::SeqCst);
            for entry in tasks.values_mut() {
                if let Some(control) = &entry.control {
                    control.cancel();
                }
                if entry.record.transition(TaskStatus::Cancelled).is_ok() {
                    self.shared.emit(TaskEvent::Status {
                        record: entry.record.clone(),
                    });
                }
            }
        }
        let handles = std::mem::take(&mut *self.shared.workers());
        let count = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("transfer worker panicked");
            }
        }
        tracing::info!(workers = count, "download coordinator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> DownloadCoordinator {
        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}").unwrap();
        DownloadCoordinator::new(source, CoordinatorOptions::default())
    }

    #[test]
    fn unknown_ids_are_rejected_without_events() {
        let c = coordinator();
        let mut rx = c.subscribe();
        for result in [c.pause("nope"), c.resume("nope"), c.cancel("nope")] {
            assert!(matches!(result, Err(CoordinatorError::UnknownIdentifier(id)) if id == "nope"));
        }
        assert!(matches!(
            c.cancel("not/valid"),
            Err(CoordinatorError::UnknownIdentifier(_))
        ));
        assert!(rx.try_recv().is_err());
        assert!(c.get("nope").is_none());
        assert!(c.list().is_empty());
    }

    #[test]
    fn invalid_ids_are_rejected_on_start() {
        let c = coordinator();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            c.start("../etc", dir.path()),
            Err(CoordinatorError::InvalidIdentifier(_))
        ));
        assert!(c.list().is_empty());
    }

    #[test]
    fn start_after_shutdown_fails() {
        let c = coordinator();
        c.shutdown();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            c.start("abc", dir.path()),
            Err(CoordinatorError::ShutDown)
        ));
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = DraftboxConfig::default();
        cfg.progress_interval_ms = 400;
        cfg.event_capacity = 8;
        let opts = CoordinatorOptions::from_config(&cfg);
        assert_eq!(opts.transfer.progress_interval, Duration::from_millis(400));
        assert_eq!(opts.transfer.connect_timeout, Duration::from_secs(30));
        assert_eq!(opts.event_capacity, 8);
        assert!(DownloadCoordinator::from_config(&cfg).is_ok());
    }

    #[test]
    fn terminal_queue_keeps_records_the_event_channel_drops() {
        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}").unwrap();
        let c = DownloadCoordinator::new(
            source,
            CoordinatorOptions {
                event_capacity: 2,
                ..Default::default()
            },
        );
        let mut lossy = c.subscribe();
        let mut terminal = c.subscribe_terminal();

        for n in 0..10 {
            let id = TaskId::parse(&format!("t{n}")).unwrap();
            let mut record = TaskRecord::new(id.clone(), "/tmp");
            record.transition(TaskStatus::Cancelled).unwrap();
            c.shared.emit(TaskEvent::Status { record });
            c.shared.emit(TaskEvent::Released { id });
        }

        assert!(matches!(
            lossy.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        let mut seen = Vec::new();
        while let Ok(record) = terminal.try_recv() {
            assert_eq!(record.status, TaskStatus::Cancelled);
            seen.push(record.id.to_string());
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], "t0");
        assert_eq!(seen[9], "t9");
    }

    #[test]
    fn closed_terminal_receivers_are_dropped() {
        let c = coordinator();
        drop(c.subscribe_terminal());
        let mut kept = c.subscribe_terminal();
        let mut record = TaskRecord::new(TaskId::parse("x").unwrap(), "/tmp");
        record.transition(TaskStatus::Cancelled).unwrap();
        c.shared.emit(TaskEvent::Status { record });

        assert!(kept.try_recv().is_ok());
        assert_eq!(c.shared.terminal.lock().unwrap().len(), 1);
    }
}

//! Worker thread body and its callbacks into the coordinator.

use std::path::Path;
use std::time::Instant;

use super::{Shared, TaskEvent};
use crate::archive_name::derive_archive_name;
use crate::control::TransferControl;
use crate::storage::PartFile;
use crate::task::{FailureKind, TaskFailure, TaskId, TaskRecord, TaskStatus};
use crate::transfer::{self, FetchedArchive, ProgressSink, TransferError, TransferRequest};

/// Runs one transfer to completion on the calling (worker) thread.
pub(super) fn run(
    shared: &Shared,
    id: &TaskId,
    run: u64,
    request: &TransferRequest,
    control: &TransferControl,
) {
    let guard = RunGuard {
        shared,
        id,
        run,
        part_path: &request.part_path,
        armed: true,
    };
    let Some(started) = begin(shared, id, run) else {
        guard.disarm();
        release(shared, id, run);
        return;
    };
    let link = WorkerLink {
        shared,
        id,
        run,
        started,
    };
    let result = transfer::fetch(request, control, &link);
    guard.disarm();
    finish(shared, id, run, result);
}

/// Queued -> Downloading. A task paused (or paused and resumed) while queued
/// keeps its status; the worker parks on its first chunk. None if the task
/// was cancelled or replaced before dispatch.
fn begin(shared: &Shared, id: &TaskId, run: u64) -> Option<Instant> {
    let mut tasks = shared.tasks();
    let entry = tasks.get_mut(id).filter(|e| e.run == run)?;
    match entry.record.status {
        TaskStatus::Queued => {
            entry.record.transition(TaskStatus::Downloading).ok()?;
            shared.emit(TaskEvent::Status {
                record: entry.record.clone(),
            });
        }
        TaskStatus::Paused | TaskStatus::Downloading => {}
        _ => return None,
    }
    tracing::info!(%id, status = %entry.record.status, "download started");
    Some(Instant::now())
}

/// Applies the transfer result under the lock. A cancel that won the race
/// turns a finished archive into a discarded one.
fn finish(
    shared: &Shared,
    id: &TaskId,
    run: u64,
    result: Result<FetchedArchive, TransferError>,
) {
    let mut tasks = shared.tasks();
    if !tasks.get(id).is_some_and(|e| e.run == run) {
        // Replaced by a newer run of the same id; only our own file is ours to clean.
        drop(tasks);
        if let Ok(fetched) = result {
            discard(fetched.part);
        }
        return;
    }
    let Some(entry) = tasks.get_mut(id) else {
        return;
    };

    let before = entry.record.status;
    let outcome = match result {
        Ok(fetched) if !entry.record.status.is_terminal() => {
            let name = derive_archive_name(id, &entry.url, fetched.content_disposition.as_deref());
            let final_path = entry.record.destination.join(name);
            let temp_path = fetched.part.temp_path().to_path_buf();
            match fetched.part.finalize(&final_path) {
                Ok(()) => {
                    tracing::info!(%id, bytes = fetched.bytes, path = %final_path.display(), "download completed");
                    entry.record.complete(fetched.bytes, final_path)
                }
                Err(e) => {
                    remove_quietly(&temp_path);
                    entry.record.fail(TaskFailure {
                        kind: FailureKind::Disk,
                        message: format!("storage: {}", e),
                    })
                }
            }
        }
        Ok(fetched) => {
            discard(fetched.part);
            Ok(())
        }
        Err(e) => match e.to_failure() {
            Some(failure) if !entry.record.status.is_terminal() => {
                tracing::warn!(%id, kind = %failure.kind, "download failed: {}", failure.message);
                entry.record.fail(failure)
            }
            Some(_) => Ok(()),
            None => {
                if entry.record.status.is_terminal() {
                    Ok(())
                } else {
                    entry.record.transition(TaskStatus::Cancelled)
                }
            }
        },
    };

    if let Err(from) = outcome {
        tracing::error!(%id, status = %from, "worker result rejected by task state");
    }
    if entry.record.status != before {
        shared.emit(TaskEvent::Status {
            record: entry.record.clone(),
        });
    }
    entry.control = None;
    shared.emit(TaskEvent::Released { id: id.clone() });
}

/// Fails the record and releases it if the worker unwinds before `finish`.
struct RunGuard<'a> {
    shared: &'a Shared,
    id: &'a TaskId,
    run: u64,
    part_path: &'a Path,
    armed: bool,
}

impl RunGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::error!(id = %self.id, "transfer worker panicked");
        remove_quietly(self.part_path);
        let mut tasks = self.shared.tasks();
        let Some(entry) = tasks.get_mut(self.id).filter(|e| e.run == self.run) else {
            return;
        };
        if !entry.record.status.is_terminal() {
            let failure = TaskFailure {
                kind: FailureKind::Network,
                message: "transfer worker panicked".to_string(),
            };
            if entry.record.fail(failure).is_ok() {
                self.shared.emit(TaskEvent::Status {
                    record: entry.record.clone(),
                });
            }
        }
        entry.control = None;
        self.shared.emit(TaskEvent::Released {
            id: self.id.clone(),
        });
    }
}

/// Drops the worker's reference without a transfer (cancelled while queued).
fn release(shared: &Shared, id: &TaskId, run: u64) {
    let mut tasks = shared.tasks();
    if let Some(entry) = tasks.get_mut(id).filter(|e| e.run == run) {
        entry.control = None;
        shared.emit(TaskEvent::Released { id: id.clone() });
    }
}

fn discard(part: PartFile) {
    let path = part.temp_path().display().to_string();
    if let Err(e) = part.discard() {
        tracing::warn!(path = %path, "could not remove part file: {}", e);
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "could not remove part file: {}", e);
        }
    }
}

/// Progress sink handed to `transfer::fetch`; writes through to the record.
struct WorkerLink<'a> {
    shared: &'a Shared,
    id: &'a TaskId,
    run: u64,
    started: Instant,
}

impl WorkerLink<'_> {
    fn update(&self, apply: impl FnOnce(&mut TaskRecord) -> bool) {
        let mut tasks = self.shared.tasks();
        let Some(entry) = tasks.get_mut(self.id).filter(|e| e.run == self.run) else {
            return;
        };
        if entry.record.status.is_terminal() || !apply(&mut entry.record) {
            return;
        }
        let stats = entry.record.progress(self.started.elapsed().as_secs_f64());
        self.shared.emit(TaskEvent::Progress {
            id: self.id.clone(),
            stats,
        });
    }
}

impl ProgressSink for WorkerLink<'_> {
    /// The total is kept while Paused but only announced once running.
    fn on_headers(&self, bytes_total: Option<u64>) {
        self.update(|record| {
            record.set_total(bytes_total);
            record.status != TaskStatus::Paused
        });
    }

    /// Ignored while Paused: `pause` already froze the count.
    fn on_progress(&self, bytes_done: u64) {
        self.update(|record| record.status != TaskStatus::Paused && record.advance(bytes_done));
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CoordinatorOptions, DownloadCoordinator, Entry};
    use super::*;
    use crate::source::TemplateSource;
    use std::sync::Arc;

    #[test]
    fn panicking_worker_fails_and_releases_its_task() {
        let dir = tempfile::tempdir().unwrap();
        let part_path = dir.path().join(".d1.7.part");
        std::fs::write(&part_path, b"partial").unwrap();

        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}/archive").unwrap();
        let coordinator = DownloadCoordinator::new(source, CoordinatorOptions::default());
        let shared = Arc::clone(&coordinator.shared);
        let id = TaskId::parse("d1").unwrap();
        let mut record = TaskRecord::new(id.clone(), dir.path());
        record.transition(TaskStatus::Downloading).unwrap();
        shared.tasks().insert(
            id.clone(),
            Entry {
                record,
                run: 7,
                url: "http://127.0.0.1:9/drafts/d1/archive".into(),
                control: Some(Arc::new(TransferControl::new())),
            },
        );
        let mut events = coordinator.subscribe();

        let worker = {
            let shared = Arc::clone(&shared);
            let id = id.clone();
            let part_path = part_path.clone();
            std::thread::spawn(move || {
                let _guard = RunGuard {
                    shared: &shared,
                    id: &id,
                    run: 7,
                    part_path: &part_path,
                    armed: true,
                };
                panic!("transfer blew up");
            })
        };
        assert!(worker.join().is_err());

        let record = coordinator.get("d1").unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.map(|e| e.kind), Some(FailureKind::Network));
        assert!(!part_path.exists());
        assert!(shared.tasks()[&id].control.is_none());

        match events.try_recv().unwrap() {
            TaskEvent::Status { record } => assert_eq!(record.status, TaskStatus::Failed),
            other => panic!("expected Failed status, got {other:?}"),
        }
        assert!(matches!(events.try_recv().unwrap(), TaskEvent::Released { .. }));
    }

    #[test]
    fn disarmed_guard_leaves_task_alone() {
        let dir = tempfile::tempdir().unwrap();
        let part_path = dir.path().join(".d1.1.part");
        std::fs::write(&part_path, b"partial").unwrap();
        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}/archive").unwrap();
        let coordinator = DownloadCoordinator::new(source, CoordinatorOptions::default());
        let id = TaskId::parse("d1").unwrap();
        let mut events = coordinator.subscribe();

        let guard = RunGuard {
            shared: &coordinator.shared,
            id: &id,
            run: 1,
            part_path: &part_path,
            armed: true,
        };
        guard.disarm();

        assert!(part_path.exists());
        assert!(events.try_recv().is_err());
    }

    fn entry_with(coordinator: &DownloadCoordinator, record: TaskRecord, run: u64) {
        coordinator.shared.tasks().insert(
            record.id.clone(),
            Entry {
                record,
                run,
                url: "http://127.0.0.1:9/drafts/q/archive".into(),
                control: Some(Arc::new(TransferControl::new())),
            },
        );
    }

    #[test]
    fn begin_keeps_a_pause_requested_while_queued() {
        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}/archive").unwrap();
        let coordinator = DownloadCoordinator::new(source, CoordinatorOptions::default());
        let id = TaskId::parse("q").unwrap();
        let mut record = TaskRecord::new(id.clone(), "/tmp");
        record.transition(TaskStatus::Paused).unwrap();
        entry_with(&coordinator, record, 3);
        let mut events = coordinator.subscribe();

        assert!(begin(&coordinator.shared, &id, 3).is_some());
        assert_eq!(coordinator.get("q").unwrap().status, TaskStatus::Paused);
        assert!(events.try_recv().is_err());

        // A stale run never starts.
        assert!(begin(&coordinator.shared, &id, 2).is_none());
    }

    #[test]
    fn begin_skips_cancelled_and_starts_queued() {
        let source = TemplateSource::new("http://127.0.0.1:9/drafts/{id}/archive").unwrap();
        let coordinator = DownloadCoordinator::new(source, CoordinatorOptions::default());
        let id = TaskId::parse("q").unwrap();
        let mut record = TaskRecord::new(id.clone(), "/tmp");
        record.transition(TaskStatus::Cancelled).unwrap();
        entry_with(&coordinator, record, 1);
        assert!(begin(&coordinator.shared, &id, 1).is_none());

        entry_with(&coordinator, TaskRecord::new(id.clone(), "/tmp"), 2);
        let mut events = coordinator.subscribe();
        assert!(begin(&coordinator.shared, &id, 2).is_some());
        match events.try_recv().unwrap() {
            TaskEvent::Status { record } => assert_eq!(record.status, TaskStatus::Downloading),
            other => panic!("expected Downloading status, got {other:?}"),
        }
    }
}

//! `draftbox get <ID>...` – download drafts with interactive pause/resume/cancel.

use anyhow::{bail, Result};
use draftbox_core::config::DraftboxConfig;
use draftbox_core::history::{spawn_recorder, HistoryDb};
use draftbox_core::progress::ProgressStats;
use draftbox_core::{
    DownloadCoordinator, StartOutcome, TaskEvent, TaskId, TaskRecord, TaskStatus,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::control::{parse_control_line, ControlCommand};

const PRINT_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_get(
    cfg: &DraftboxConfig,
    db: &HistoryDb,
    ids: &[String],
    dest: &Path,
) -> Result<()> {
    let coordinator = DownloadCoordinator::from_config(cfg)?;
    let recorder = spawn_recorder(db.clone(), coordinator.subscribe_terminal());
    let mut events = coordinator.subscribe();

    let mut pending: HashSet<TaskId> = HashSet::new();
    for id in ids {
        start_one(&coordinator, id, dest, &mut pending);
    }
    if pending.is_empty() {
        bail!("no downloads started");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_print: HashMap<TaskId, Instant> = HashMap::new();
    let mut interrupted = false;

    while !pending.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(TaskEvent::Progress { id, stats }) => {
                    let now = Instant::now();
                    let due = last_print
                        .get(&id)
                        .map_or(true, |t| now.duration_since(*t) >= PRINT_INTERVAL);
                    if due {
                        println!("{}", format_progress(&id, &stats));
                        last_print.insert(id, now);
                    }
                }
                Ok(TaskEvent::Status { record }) => println!("{}", format_status(&record)),
                Ok(TaskEvent::Released { id }) => {
                    pending.remove(&id);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "progress display lagged");
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => handle_control(&coordinator, &line, dest, &mut pending),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::debug!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted; cancelling downloads.");
                interrupted = true;
                break;
            }
        }
    }

    let closing = coordinator.clone();
    tokio::task::spawn_blocking(move || closing.shutdown()).await?;
    let records = coordinator.list();
    drop(events);
    drop(coordinator);
    match recorder.await {
        Ok(written) => tracing::debug!(written, "history recorder finished"),
        Err(e) => tracing::warn!("history recorder failed: {}", e),
    }

    summarize(&records, interrupted)
}

fn start_one(
    coordinator: &DownloadCoordinator,
    id: &str,
    dest: &Path,
    pending: &mut HashSet<TaskId>,
) {
    // Each draft gets its own folder so server-chosen names cannot collide.
    match coordinator.start(id, dest.join(id.trim())) {
        Ok(StartOutcome::Started) => {
            if let Ok(id) = TaskId::parse(id) {
                pending.insert(id);
            }
        }
        Ok(StartOutcome::AlreadyActive) => println!("{id}: already downloading"),
        Err(e) => eprintln!("{id}: {e}"),
    }
}

fn handle_control(
    coordinator: &DownloadCoordinator,
    line: &str,
    dest: &Path,
    pending: &mut HashSet<TaskId>,
) {
    let result = match parse_control_line(line) {
        Ok(ControlCommand::Pause(id)) => coordinator.pause(&id),
        Ok(ControlCommand::Resume(id)) => coordinator.resume(&id),
        Ok(ControlCommand::Cancel(id)) => coordinator.cancel(&id),
        Ok(ControlCommand::Start(id)) => {
            start_one(coordinator, &id, dest, pending);
            Ok(())
        }
        Ok(ControlCommand::Status) => {
            for record in coordinator.list() {
                println!("{}", format_status(&record));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("{e}");
    }
}

/// Prints one line per record and errors if anything did not complete.
fn summarize(records: &[TaskRecord], interrupted: bool) -> Result<()> {
    let mut unfinished = 0;
    for record in records {
        match record.status {
            TaskStatus::Completed => {}
            TaskStatus::Cancelled if !interrupted => {}
            _ => unfinished += 1,
        }
    }
    let completed = records
        .iter()
        .filter(|r| r.status == TaskStatus::Completed)
        .count();
    println!("{completed} of {} download(s) completed.", records.len());
    if unfinished > 0 {
        bail!("{unfinished} download(s) did not complete");
    }
    Ok(())
}

pub(crate) fn format_progress(id: &TaskId, stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    match (stats.bytes_total, stats.fraction()) {
        (Some(total), Some(fraction)) => format!(
            "  {id}: {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
            done_mib,
            total as f64 / 1_048_576.0,
            fraction * 100.0,
            rate_mib,
            eta
        ),
        _ => format!("  {id}: {:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
    }
}

pub(crate) fn format_status(record: &TaskRecord) -> String {
    match (&record.status, &record.error, &record.archive_path) {
        (TaskStatus::Failed, Some(err), _) => format!("{}: failed ({})", record.id, err),
        (TaskStatus::Completed, _, Some(path)) => {
            format!("{}: completed -> {}", record.id, path.display())
        }
        (status, _, _) => format!("{}: {}", record.id, status),
    }
}

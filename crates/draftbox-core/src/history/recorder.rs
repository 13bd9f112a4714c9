//! Background task persisting terminal records handed over by the coordinator.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::db::HistoryDb;
use crate::task::TaskRecord;

/// Spawns a task that writes every Completed, Failed or Cancelled record to `db`.
///
/// Feed it `DownloadCoordinator::subscribe_terminal`, which never drops a
/// record. The task ends when the queue closes, i.e. once every coordinator
/// handle and worker thread is gone. Returns the number of records written.
pub fn spawn_recorder(
    db: HistoryDb,
    mut records: mpsc::UnboundedReceiver<TaskRecord>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut written = 0u64;
        while let Some(record) = records.recv().await {
            if !record.status.is_terminal() {
                continue;
            }
            match db.record(&record).await {
                Ok(()) => {
                    written += 1;
                    tracing::debug!(id = %record.id, status = %record.status, "history updated");
                }
                Err(e) => tracing::warn!(id = %record.id, "could not write history: {:#}", e),
            }
        }
        written
    })
}

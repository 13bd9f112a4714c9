//! `draftbox remove <id>` – forget a draft; optionally delete its archive with --delete-files.

use anyhow::{bail, Result};
use draftbox_core::history::HistoryDb;

pub async fn run_remove(db: &HistoryDb, id: &str, delete_files: bool) -> Result<()> {
    let Some(entry) = db.get(id).await? else {
        bail!("no draft {id:?} in history");
    };
    if delete_files {
        if let Some(path) = &entry.archive_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "deleted archive"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), "could not delete archive: {}", e),
            }
        }
    }

    db.remove(id).await?;
    println!("Removed draft {id}");
    Ok(())
}

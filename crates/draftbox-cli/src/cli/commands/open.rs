//! `draftbox open <id>` – show a downloaded draft in the file manager.

use anyhow::{anyhow, Result};
use draftbox_core::history::HistoryDb;
use draftbox_core::opener;

pub async fn run_open(db: &HistoryDb, id: &str) -> Result<()> {
    let entry = db
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("no draft {id:?} in history"))?;
    let target = entry.archive_path.unwrap_or(entry.destination);
    opener::open_folder(&target)?;
    println!("Opened {}", target.display());
    Ok(())
}

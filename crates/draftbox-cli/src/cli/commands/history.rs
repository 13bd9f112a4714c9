//! `draftbox history` and `draftbox search` – page through finished downloads.

use anyhow::{anyhow, Result};
use draftbox_core::history::{DraftEntry, DraftQuery, HistoryDb};
use draftbox_core::TaskStatus;

pub async fn run_history(
    db: &HistoryDb,
    status: Option<&str>,
    page: u32,
    page_size: u32,
) -> Result<()> {
    let status = status
        .map(|s| TaskStatus::parse(s).ok_or_else(|| anyhow!("unknown status {s:?}")))
        .transpose()?;
    let query = DraftQuery {
        status,
        page,
        page_size,
        ..Default::default()
    };
    let total = db.count(status).await?;
    print_page(&db.list(&query).await?, &query, Some(total));
    Ok(())
}

pub async fn run_search(db: &HistoryDb, keyword: &str, page: u32, page_size: u32) -> Result<()> {
    let query = DraftQuery {
        keyword: Some(keyword.to_string()),
        page,
        page_size,
        ..Default::default()
    };
    print_page(&db.list(&query).await?, &query, None);
    Ok(())
}

fn print_page(entries: &[DraftEntry], query: &DraftQuery, total: Option<u64>) {
    if entries.is_empty() {
        println!("No drafts found.");
        return;
    }
    println!("{:<24} {:<10} {:<10} {}", "ID", "STATUS", "SIZE", "LOCATION");
    for e in entries {
        println!("{}", format_row(e));
    }
    match total {
        Some(total) => println!("page {} ({} of {} shown)", query.page.max(1), entries.len(), total),
        None => println!("page {} ({} shown)", query.page.max(1), entries.len()),
    }
}

pub(crate) fn format_row(e: &DraftEntry) -> String {
    let size = e
        .bytes_total
        .map(|s| format!("{s}"))
        .unwrap_or_else(|| "-".to_string());
    let location = match (&e.archive_path, &e.error) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(err)) => err.to_string(),
        (None, None) => e.destination.display().to_string(),
    };
    format!("{:<24} {:<10} {:<10} {}", e.id, e.status.as_str(), size, location)
}

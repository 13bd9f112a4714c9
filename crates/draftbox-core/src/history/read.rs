//! History read operations: get, list/search and count.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use super::db::HistoryDb;
use super::types::{DraftEntry, DraftQuery};
use crate::task::{FailureKind, TaskFailure, TaskStatus};

const COLUMNS: &str = "id, destination, archive_path, status, bytes_total, bytes_done, \
                       error_kind, error_message, created_at, updated_at";

impl HistoryDb {
    pub async fn get(&self, id: &str) -> Result<Option<DraftEntry>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM drafts WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(entry_from_row))
    }

    /// One page of entries matching `query`, most recently updated first.
    pub async fn list(&self, query: &DraftQuery) -> Result<Vec<DraftEntry>> {
        let (limit, offset) = query.limit_offset();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM drafts
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL
                   OR id LIKE ?2 ESCAPE '\'
                   OR destination LIKE ?2 ESCAPE '\'
                   OR archive_path LIKE ?2 ESCAPE '\')
            ORDER BY updated_at DESC, id ASC
            LIMIT ?3 OFFSET ?4
            "#
        ))
        .bind(query.status.map(TaskStatus::as_str))
        .bind(query.like_pattern())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    /// Number of entries, optionally only those with `status`.
    pub async fn count(&self, status: Option<TaskStatus>) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM drafts WHERE (?1 IS NULL OR status = ?1)")
            .bind(status.map(TaskStatus::as_str))
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as u64)
    }
}

fn entry_from_row(row: &SqliteRow) -> DraftEntry {
    let status: String = row.get("status");
    let archive_path: Option<String> = row.get("archive_path");
    let bytes_total: Option<i64> = row.get("bytes_total");
    let bytes_done: i64 = row.get("bytes_done");
    let error_kind: Option<String> = row.get("error_kind");
    let error_message: Option<String> = row.get("error_message");
    let destination: String = row.get("destination");

    let error = error_kind
        .as_deref()
        .and_then(FailureKind::from_str)
        .map(|kind| TaskFailure {
            kind,
            message: error_message.unwrap_or_default(),
        });

    DraftEntry {
        id: row.get("id"),
        destination: PathBuf::from(destination),
        archive_path: archive_path.map(PathBuf::from),
        status: TaskStatus::from_str(&status),
        bytes_total: bytes_total.map(|n| n.max(0) as u64),
        bytes_done: bytes_done.max(0) as u64,
        error,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

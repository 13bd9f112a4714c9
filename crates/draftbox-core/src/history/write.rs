//! History write operations: record and remove.

use anyhow::Result;

use super::db::HistoryDb;
use crate::task::TaskRecord;

impl HistoryDb {
    /// Insert or replace the row for `record.id`. A restarted draft keeps its
    /// original `created_at`.
    pub async fn record(&self, record: &TaskRecord) -> Result<()> {
        let archive_path = record
            .archive_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let (error_kind, error_message) = match &record.error {
            Some(e) => (Some(e.kind.as_str()), Some(e.message.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO drafts (
                id, destination, archive_path, status, bytes_total, bytes_done,
                error_kind, error_message, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                destination = excluded.destination,
                archive_path = excluded.archive_path,
                status = excluded.status,
                bytes_total = excluded.bytes_total,
                bytes_done = excluded.bytes_done,
                error_kind = excluded.error_kind,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.destination.to_string_lossy().into_owned())
        .bind(archive_path)
        .bind(record.status.as_str())
        .bind(record.bytes_total.map(|n| n as i64))
        .bind(record.bytes_done as i64)
        .bind(error_kind)
        .bind(error_message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the row for `id`. Returns false if there was none.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Row and query types for the draft history.

use std::path::PathBuf;

use crate::task::{TaskFailure, TaskStatus};

/// One stored download run.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftEntry {
    pub id: String,
    pub destination: PathBuf,
    pub archive_path: Option<PathBuf>,
    pub status: TaskStatus,
    pub bytes_total: Option<u64>,
    pub bytes_done: u64,
    pub error: Option<TaskFailure>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Filter and page for `HistoryDb::list`. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct DraftQuery {
    pub status: Option<TaskStatus>,
    /// Substring matched against id, destination and archive path.
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for DraftQuery {
    fn default() -> Self {
        Self {
            status: None,
            keyword: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl DraftQuery {
    pub(crate) fn limit_offset(&self) -> (i64, i64) {
        let size = i64::from(self.page_size.max(1));
        let page = i64::from(self.page.max(1));
        (size, (page - 1) * size)
    }

    /// `%keyword%` with LIKE wildcards in the keyword escaped (escape char `\`).
    pub(crate) fn like_pattern(&self) -> Option<String> {
        let keyword = self.keyword.as_deref()?.trim();
        if keyword.is_empty() {
            return None;
        }
        let mut pattern = String::from("%");
        for c in keyword.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        Some(pattern)
    }
}

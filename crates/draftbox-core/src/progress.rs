//! Progress snapshots (bytes done, rate, ETA).
//!
//! Consumers derive rate = bytes_done / elapsed_secs and
//! ETA = (bytes_total - bytes_done) / rate.

/// Snapshot of one task's progress, carried by `TaskEvent::Progress`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStats {
    /// Bytes written to the part file so far.
    pub bytes_done: u64,
    /// Expected size, if the server announced one.
    pub bytes_total: Option<u64>,
    /// Seconds since the worker started the transfer.
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Average rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if size or rate is unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.bytes_total?.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], or None when the size is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_total? {
            0 => Some(1.0),
            total => Some((self.bytes_done as f64 / total as f64).min(1.0)),
        }
    }
}

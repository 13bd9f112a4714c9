//! Per-transfer pause/cancel signals shared between the coordinator and a worker.
//!
//! Every body chunk is written while holding the gate, and `pause` flips its
//! flag under the same gate, so the byte count `pause` returns is exactly what
//! is on disk and stays there until `resume`. A paused worker parks on a
//! condvar inside the curl write callback, so the connection stays open while
//! nothing is read.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Pause/cancel flags for one transfer.
#[derive(Debug, Default)]
pub struct TransferControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
    /// Bytes committed to the part file, updated under `gate`.
    written: AtomicU64,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Permission to write one chunk. The gate is held until `commit` or drop.
pub struct ChunkPermit<'a> {
    _gate: MutexGuard<'a, ()>,
    written: &'a AtomicU64,
}

impl ChunkPermit<'_> {
    /// Publishes the part file length after the chunk was appended.
    pub fn commit(self, written: u64) {
        self.written.store(written, Ordering::SeqCst);
    }
}

impl TransferControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a pause. Returns the bytes written so far; no further chunk is
    /// written until `resume` or `cancel`.
    pub fn pause(&self) -> u64 {
        let _gate = self.gate();
        self.paused.store(true, Ordering::SeqCst);
        self.written.load(Ordering::SeqCst)
    }

    /// Release a paused worker.
    pub fn resume(&self) {
        {
            let _gate = self.gate();
            self.paused.store(false, Ordering::SeqCst);
        }
        self.wake.notify_all();
    }

    /// Request cancellation; also wakes a parked worker.
    pub fn cancel(&self) {
        {
            let _gate = self.gate();
            self.cancelled.store(true, Ordering::SeqCst);
        }
        self.wake.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bytes committed by the worker so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    /// Blocks while paused, then grants the next chunk write. None once
    /// cancellation was requested.
    pub fn enter(&self) -> Option<ChunkPermit<'_>> {
        let mut gate = self.gate();
        while self.is_paused() && !self.is_cancelled() {
            gate = self
                .wake
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if self.is_cancelled() {
            return None;
        }
        Some(ChunkPermit {
            _gate: gate,
            written: &self.written,
        })
    }
}

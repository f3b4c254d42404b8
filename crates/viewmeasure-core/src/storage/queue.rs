//! Ordered queue of pending persistence writes.
//!
//! Every mutation of a session enqueues the writes it implies; the queue is
//! drained strictly in FIFO order, so a full-set save issued after a delete
//! can never land before it.

use crate::geometry::{Measurement, MeasurementId};
use std::collections::VecDeque;

/// A single write against the measurement store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Upsert the given rows of one image.
    SaveAll {
        image: String,
        measurements: Vec<Measurement>,
    },
    /// Delete one row.
    Remove { image: String, id: MeasurementId },
    /// Delete every row of one image.
    ClearImage { image: String },
    /// Delete every row.
    ClearAll,
    /// Persist the session-wide measurement color.
    SaveColor { color: String },
}

impl WriteOp {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::SaveAll { .. } => "save_all",
            WriteOp::Remove { .. } => "remove",
            WriteOp::ClearImage { .. } => "clear_image",
            WriteOp::ClearAll => "clear_all",
            WriteOp::SaveColor { .. } => "save_color",
        }
    }
}

/// Outcome counts of the writes drained so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub applied: u64,
    pub failed: u64,
}

/// FIFO of writes not yet applied to storage.
#[derive(Debug, Default)]
pub struct WriteQueue {
    ops: VecDeque<WriteOp>,
    stats: WriteStats,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        // Consecutive color saves collapse into the latest one
        if let (WriteOp::SaveColor { .. }, Some(WriteOp::SaveColor { .. })) = (&op, self.ops.back()) {
            self.ops.pop_back();
        }
        self.ops.push_back(op);
    }

    pub fn pop(&mut self) -> Option<WriteOp> {
        self.ops.pop_front()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn record_applied(&mut self) {
        self.stats.applied += 1;
    }

    pub fn record_failed(&mut self) {
        self.stats.failed += 1;
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }
}

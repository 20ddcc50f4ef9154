// src/sched/queue.rs

//! FIFO queue of pending kernel submissions.

use std::collections::VecDeque;

use tracing::debug;

use crate::graph::BlockId;

/// One unit of work for the kernel.
///
/// The code is snapshotted at enqueue time, so editing a block after it was
/// queued but before it was dispatched still runs what the user triggered.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedExecution {
    pub block: BlockId,
    pub code: String,
}

/// The pending work for the single external kernel.
///
/// `busy == true` means exactly one submission has been dispatched and has
/// not yet reported a terminal event; the queue itself holds only
/// not-yet-dispatched entries. FIFO order is preserved exactly; nothing is
/// ever reordered once enqueued.
#[derive(Debug, Default)]
pub struct ExecQueue {
    entries: VecDeque<QueuedExecution>,
    busy: bool,
}

impl ExecQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Append a work item. Never dispatches by itself.
    pub fn enqueue(&mut self, entry: QueuedExecution) {
        debug!(block = ?entry.block, queued = self.entries.len() + 1, "enqueued execution");
        self.entries.push_back(entry);
    }

    /// Pop the head entry, if any.
    pub fn pop_next(&mut self) -> Option<QueuedExecution> {
        self.entries.pop_front()
    }

    /// Drop all pending entries, returning them for state cleanup.
    pub fn drain(&mut self) -> Vec<QueuedExecution> {
        let drained: Vec<QueuedExecution> = self.entries.drain(..).collect();
        if !drained.is_empty() {
            debug!(drained = drained.len(), "cleared execution queue");
        }
        drained
    }

    /// Blocks referenced by not-yet-dispatched entries, in queue order.
    pub fn pending_blocks(&self) -> Vec<BlockId> {
        self.entries.iter().map(|e| e.block).collect()
    }
}

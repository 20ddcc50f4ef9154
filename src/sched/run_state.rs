// src/sched/run_state.rs

//! Per-block run state.

use serde::{Deserialize, Serialize};

/// State of a block with respect to the current run cycle.
///
/// `Idle -> Pending -> Running -> {Done, Crashed}`, with a return edge to
/// `Idle` on interrupt or source edit. `Pending` exists purely so the
/// editor can render "queued" distinctly from "executing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not part of an active run cycle.
    Idle,
    /// Selected to run, waiting for its turn at the head of the queue.
    Pending,
    /// Dispatched to the kernel; at most one block is ever in this state.
    Running,
    /// The kernel reported success.
    Done,
    /// The kernel reported an error.
    Crashed,
}

impl RunState {
    /// Whether the state is terminal for the current cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Crashed)
    }
}

// src/sched/step.rs

//! Step-by-step execution result types for the scheduler.

use crate::graph::{BlockId, Stage};
use crate::sched::queue::QueuedExecution;
use crate::sched::run_state::RunState;

/// Structured result of a single scheduler "step".
///
/// The pure core translates this into commands for the IO shell; tests use
/// it to manually step the scheduler and make assertions about what
/// changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// The submission to hand to the kernel now, if one reached the head of
    /// the queue. Single-flight: never more than one per step.
    pub dispatched: Option<QueuedExecution>,
    /// Whether the kernel should be told to interrupt its current work.
    pub interrupt_kernel: bool,
    /// Whether the entry point was rejected because a run cycle is already
    /// active (a silent no-op for the caller).
    pub rejected: bool,
    /// The notification stages of a run cycle that started in this step.
    pub started_stages: Option<Vec<Stage>>,
    /// Whether this step ended the active run cycle (queue drained, kernel
    /// idle, or interrupted).
    pub cycle_finished: bool,
    /// Run-state transitions applied during this step, in order.
    pub state_changes: Vec<(BlockId, RunState)>,
}

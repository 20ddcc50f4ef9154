// src/engine/mod.rs

//! Orchestration engine for blockflow.
//!
//! This module ties together:
//! - the run scheduler
//! - the kernel coordinator (submission, completion, interrupt)
//! - the main runtime event loop that reacts to:
//!   - editor triggers (`run_left` / `run_right` / edits / interrupt)
//!   - kernel output and terminal events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use serde::{Deserialize, Serialize};

use crate::graph::{BlockId, OutputChunk, Stage};
use crate::sched::RunState;

/// Terminal event of one kernel submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Error(String),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once the scheduler is idle (used for
    /// headless batch runs of a document).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the editor and the kernel.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Run a block and its upstream dependencies.
    RunLeft { block: BlockId },
    /// Re-run every block depending on this one.
    RunRight { block: BlockId },
    /// The user edited a code block's source.
    SourceEdited { block: BlockId, source: String },
    /// The user moved a slider block.
    SliderMoved { block: BlockId, value: f64 },
    /// The kernel streamed an incremental output chunk.
    ExecOutput { block: BlockId, chunk: OutputChunk },
    /// The kernel delivered the terminal event for a submission.
    ExecFinished {
        block: BlockId,
        outcome: ExecOutcome,
    },
    /// Cancel the active run cycle.
    InterruptRequested,
    /// Graceful shutdown requested.
    ShutdownRequested,
}

/// Feedback for the editor layer, delivered over the notification channel.
///
/// Stage contents and order are part of the scheduling contract; how long
/// each stage is displayed is the editor's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// A run cycle started with these notification stages.
    CycleStarted { stages: Vec<Stage> },
    /// A block's run state changed.
    BlockState { block: BlockId, state: RunState },
    /// Output streamed back for a block.
    Output { block: BlockId, chunk: OutputChunk },
    /// The active run cycle ended (drained or interrupted).
    CycleFinished,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;

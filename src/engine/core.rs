// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing submissions to the kernel backend
//! - forwarding notifications to the editor
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or processes. It is also where the single-logical-thread
//! requirement is enforced by construction: every mutation of the queue,
//! the busy flag and block state happens inside `step`, driven by one event
//! at a time.

use crate::engine::event_handlers::{
    handle_exec_finished, handle_exec_output, handle_interrupt, handle_run_left,
    handle_run_right, handle_slider_moved, handle_source_edited, CoreStep,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::sched::Scheduler;

/// Pure core runtime state.
///
/// This owns the scheduler (and through it the graph and execution queue)
/// plus the runtime options. It has **no** channels, no Tokio types, and
/// does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    /// Expose whether the scheduler is idle (for tests and shutdown logic).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Expose queue emptiness (for tests).
    pub fn queue_is_empty(&self) -> bool {
        self.scheduler.queue_is_empty()
    }

    /// Read-only access to the scheduler for observation.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::RunLeft { block } => handle_run_left(&mut self.scheduler, block),
            RuntimeEvent::RunRight { block } => handle_run_right(&mut self.scheduler, block),
            RuntimeEvent::SourceEdited { block, source } => {
                handle_source_edited(&mut self.scheduler, block, source)
            }
            RuntimeEvent::SliderMoved { block, value } => {
                handle_slider_moved(&mut self.scheduler, block, value)
            }
            RuntimeEvent::ExecOutput { block, chunk } => {
                handle_exec_output(&mut self.scheduler, block, chunk)
            }
            RuntimeEvent::ExecFinished { block, outcome } => {
                handle_exec_finished(&mut self.scheduler, &self.options, block, outcome)
            }
            RuntimeEvent::InterruptRequested => handle_interrupt(&mut self.scheduler),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

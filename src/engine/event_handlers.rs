// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::warn;

use crate::engine::{ExecOutcome, Notification, RuntimeOptions};
use crate::graph::{BlockId, OutputChunk};
use crate::sched::{QueuedExecution, Scheduler, SchedulerStep};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand this submission to the kernel.
    SubmitToKernel(QueuedExecution),
    /// Tell the kernel to abort its current execution.
    InterruptKernel,
    /// Forward feedback to the editor layer.
    Notify(Notification),
    /// Request that the runtime loop exits (used for `exit_when_idle`).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a `run_left` trigger from the editor.
pub fn handle_run_left(scheduler: &mut Scheduler, block: BlockId) -> CoreStep {
    match scheduler.run_left(block) {
        Ok(step) => CoreStep::running(commands_from_step(step)),
        Err(err) => {
            warn!(?block, error = %err, "run_left failed");
            CoreStep::running(Vec::new())
        }
    }
}

/// Handle a `run_right` trigger from the editor.
pub fn handle_run_right(scheduler: &mut Scheduler, block: BlockId) -> CoreStep {
    match scheduler.run_right(block) {
        Ok(step) => CoreStep::running(commands_from_step(step)),
        Err(err) => {
            warn!(?block, error = %err, "run_right failed");
            CoreStep::running(Vec::new())
        }
    }
}

/// Handle a source edit: apply it and invalidate the downstream closure.
pub fn handle_source_edited(
    scheduler: &mut Scheduler,
    block: BlockId,
    source: String,
) -> CoreStep {
    match scheduler.source_edited(block, source) {
        Ok(step) => CoreStep::running(commands_from_step(step)),
        Err(err) => {
            warn!(?block, error = %err, "source edit failed");
            CoreStep::running(Vec::new())
        }
    }
}

/// Handle a slider move the same way as a source edit.
pub fn handle_slider_moved(scheduler: &mut Scheduler, block: BlockId, value: f64) -> CoreStep {
    match scheduler.slider_moved(block, value) {
        Ok(step) => CoreStep::running(commands_from_step(step)),
        Err(err) => {
            warn!(?block, error = %err, "slider move failed");
            CoreStep::running(Vec::new())
        }
    }
}

/// Handle an incremental output chunk from the kernel.
pub fn handle_exec_output(
    scheduler: &mut Scheduler,
    block: BlockId,
    chunk: OutputChunk,
) -> CoreStep {
    scheduler.record_output(block, chunk.clone());
    CoreStep::running(vec![CoreCommand::Notify(Notification::Output {
        block,
        chunk,
    })])
}

/// Handle the kernel's terminal event for a submission.
pub fn handle_exec_finished(
    scheduler: &mut Scheduler,
    options: &RuntimeOptions,
    block: BlockId,
    outcome: ExecOutcome,
) -> CoreStep {
    let step = scheduler.on_exec_finished(block, outcome);
    let mut commands = commands_from_step(step);

    let mut keep_running = true;
    if options.exit_when_idle && scheduler.is_idle() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Handle an interrupt request from the editor.
pub fn handle_interrupt(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.interrupt();
    CoreStep::running(commands_from_step(step))
}

/// Translate a scheduler step into ordered commands for the IO shell.
fn commands_from_step(step: SchedulerStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    if step.interrupt_kernel {
        commands.push(CoreCommand::InterruptKernel);
    }
    if let Some(stages) = step.started_stages {
        commands.push(CoreCommand::Notify(Notification::CycleStarted { stages }));
    }
    for (block, state) in step.state_changes {
        commands.push(CoreCommand::Notify(Notification::BlockState {
            block,
            state,
        }));
    }
    if let Some(exec) = step.dispatched {
        commands.push(CoreCommand::SubmitToKernel(exec));
    }
    if step.cycle_finished {
        commands.push(CoreCommand::Notify(Notification::CycleFinished));
    }

    commands
}

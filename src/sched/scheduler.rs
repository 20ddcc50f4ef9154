// src/sched/scheduler.rs

use tracing::{debug, info, warn};

use crate::engine::ExecOutcome;
use crate::errors::Result;
use crate::graph::{
    staged_span, upstream_closure, BlockId, Direction, EdgeId, Graph, OutputChunk, Stage,
};
use crate::sched::queue::{ExecQueue, QueuedExecution};
use crate::sched::run_state::RunState;
use crate::sched::step::SchedulerStep;

/// Scheduler holds the graph plus the mutable state of one run cycle.
///
/// It is responsible for:
/// - computing what a `run_left` / `run_right` trigger must execute
/// - serializing that work against the single external kernel (at most one
///   submission in flight, FIFO otherwise)
/// - driving every block's run state from dispatch and completion
/// - interrupt semantics: clearing the queue and resetting touched blocks
///
/// All methods are synchronous and return a [`SchedulerStep`] describing
/// what the IO shell must do next; the scheduler itself never performs IO.
#[derive(Debug)]
pub struct Scheduler {
    graph: Graph,
    queue: ExecQueue,
    /// The block whose submission is currently in flight, if any.
    running: Option<BlockId>,
    /// Notification stages of the active run cycle; empty when idle.
    stages: Vec<Stage>,
}

impl Scheduler {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            queue: ExecQueue::new(),
            running: None,
            stages: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the graph for the editor layer.
    ///
    /// Structural edits while a run cycle is active are the caller's
    /// responsibility; the entry points below reject new cycles until the
    /// current one drains.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Whether a run cycle is currently active.
    pub fn cycle_active(&self) -> bool {
        !self.stages.is_empty() || !self.queue.is_empty() || self.queue.busy()
    }

    pub fn is_idle(&self) -> bool {
        !self.cycle_active()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn busy(&self) -> bool {
        self.queue.busy()
    }

    /// Read-only view of a block's run state.
    pub fn run_state_of(&self, block: BlockId) -> Option<RunState> {
        self.graph.block(block).map(|b| b.run_state())
    }

    /// The active cycle's notification stages, for timed display.
    pub fn active_stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run a block and everything it depends on.
    ///
    /// The upstream closure is enqueued in reverse discovery order (most
    /// distant dependency first), each block only if the current cycle has
    /// not already run it, then the block itself under the same condition.
    /// Rejected outright while a run cycle is active.
    pub fn run_left(&mut self, block: BlockId) -> Result<SchedulerStep> {
        let mut step = SchedulerStep::default();
        if self.cycle_active() {
            debug!(?block, "run_left rejected; run cycle already active");
            step.rejected = true;
            return Ok(step);
        }

        let closure = upstream_closure(&self.graph, block, Direction::Upstream)?;
        for &dep in closure.blocks_to_run.iter().rev() {
            self.enqueue_if_unrun(dep, &mut step);
        }
        self.enqueue_if_unrun(block, &mut step);

        info!(?block, queued = self.queue.len(), "run_left scheduled");
        self.begin_cycle(closure.stages, &mut step);
        Ok(step)
    }

    /// Re-run every block that depends on `block`.
    ///
    /// Each dependent (nearest to farthest) is forced to re-run; its own
    /// upstream closure is unioned into the run set by plain concatenation
    /// so unmet dependencies run first. Duplicates across dependents are
    /// kept; `has_been_run` suppression at dispatch guarantees each block
    /// still executes at most once per cycle. Rejected outright while a run
    /// cycle is active.
    pub fn run_right(&mut self, block: BlockId) -> Result<SchedulerStep> {
        let mut step = SchedulerStep::default();
        if self.cycle_active() {
            debug!(?block, "run_right rejected; run cycle already active");
            step.rejected = true;
            return Ok(step);
        }

        let stages = staged_span(&self.graph, block)?;
        let down = upstream_closure(&self.graph, block, Direction::Downstream)?;

        // Entering a new cycle clears the memo of every included dependent;
        // their dependencies stay memoized and only run when unmet.
        for &dep in &down.blocks_to_run {
            if let Some(b) = self.graph.block_mut(dep) {
                b.set_has_been_run(false);
            }
        }
        for &dep in &down.blocks_to_run {
            let up = upstream_closure(&self.graph, dep, Direction::Upstream)?;
            for &anc in up.blocks_to_run.iter().rev() {
                self.enqueue_if_unrun(anc, &mut step);
            }
            self.enqueue_if_unrun(dep, &mut step);
        }

        info!(?block, queued = self.queue.len(), "run_right scheduled");
        self.begin_cycle(stages, &mut step);
        Ok(step)
    }

    /// Handle the kernel's terminal event for a submission.
    ///
    /// A crash does not halt the queue: unrelated queued work keeps
    /// draining. Completions for blocks that are no longer running (reset
    /// by an interrupt or edit meanwhile) are ignored.
    pub fn on_exec_finished(&mut self, block: BlockId, outcome: ExecOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.running != Some(block) {
            debug!(?block, "ignoring stale completion");
            return step;
        }
        self.running = None;
        self.queue.set_busy(false);

        // Skip the state transition when the block was invalidated while
        // its submission was in flight; the result is stale.
        let still_running = self
            .graph
            .block(block)
            .is_some_and(|b| b.run_state() == RunState::Running);
        if still_running {
            match outcome {
                ExecOutcome::Success => {
                    if let Some(b) = self.graph.block_mut(block) {
                        b.set_has_been_run(true);
                    }
                    self.set_state(block, RunState::Done, &mut step);
                }
                ExecOutcome::Error(message) => {
                    warn!(?block, %message, "kernel reported execution error");
                    self.set_state(block, RunState::Crashed, &mut step);
                }
            }
        }

        self.run_queue(&mut step);
        step
    }

    /// Record an incremental output chunk streamed back for a block.
    pub fn record_output(&mut self, block: BlockId, chunk: OutputChunk) {
        if let Some(b) = self.graph.block_mut(block) {
            b.push_output(chunk);
        }
    }

    /// Cancel the current run cycle.
    ///
    /// Every block referenced by a not-yet-dispatched queue entry and the
    /// currently running block are reset to idle with their memo cleared;
    /// the queue is emptied and the kernel is told to abort. Blocks that
    /// already finished keep their state.
    pub fn interrupt(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        step.interrupt_kernel = true;

        for entry in self.queue.drain() {
            self.reset_block(entry.block, &mut step);
        }
        if let Some(block) = self.running.take() {
            self.reset_block(block, &mut step);
        }
        self.queue.set_busy(false);
        self.finish_cycle(&mut step);

        info!(resets = step.state_changes.len(), "execution interrupted");
        step
    }

    /// Apply a source edit and invalidate the block plus its downstream
    /// closure, forcing them to re-run in a later cycle.
    pub fn source_edited(&mut self, block: BlockId, code: String) -> Result<SchedulerStep> {
        self.graph.set_source(block, code)?;
        self.invalidate_downstream(block)
    }

    /// Apply a slider move; invalidation mirrors a source edit, since the
    /// rendered assignment changed.
    pub fn slider_moved(&mut self, block: BlockId, value: f64) -> Result<SchedulerStep> {
        self.graph.set_slider_value(block, value)?;
        self.invalidate_downstream(block)
    }

    fn invalidate_downstream(&mut self, block: BlockId) -> Result<SchedulerStep> {
        let mut step = SchedulerStep::default();
        let down = upstream_closure(&self.graph, block, Direction::Downstream)?;
        self.reset_block(block, &mut step);
        for &dep in &down.blocks_to_run {
            self.reset_block(dep, &mut step);
        }
        debug!(?block, invalidated = step.state_changes.len(), "source edit invalidation");
        Ok(step)
    }

    /// Enqueue a block's code unless the current cycle already ran it.
    fn enqueue_if_unrun(&mut self, block: BlockId, step: &mut SchedulerStep) {
        let Some(b) = self.graph.block(block) else {
            return;
        };
        if b.has_been_run() {
            return;
        }
        let code = b.source();
        self.set_state(block, RunState::Pending, step);
        self.queue.enqueue(QueuedExecution { block, code });
    }

    /// Start the cycle's notification stages and kick the queue.
    fn begin_cycle(&mut self, stages: Vec<Stage>, step: &mut SchedulerStep) {
        for edge in staged_edges(&stages) {
            if let Some(e) = self.graph.edge_mut(edge) {
                e.set_run_state(RunState::Pending);
            }
        }
        step.started_stages = Some(stages.clone());
        self.stages = stages;
        self.run_queue(step);
    }

    /// Dispatch the next eligible queue entry, if the kernel is free.
    ///
    /// No-op while a submission is in flight (the re-entrancy guard).
    /// Entries whose block already ran in this cycle are skipped, which is
    /// what suppresses the duplicates a right-run may enqueue.
    fn run_queue(&mut self, step: &mut SchedulerStep) {
        if self.queue.busy() {
            return;
        }
        while let Some(entry) = self.queue.pop_next() {
            let Some(b) = self.graph.block(entry.block) else {
                continue;
            };
            if b.has_been_run() {
                debug!(block = ?entry.block, "skipping already-run queue entry");
                continue;
            }
            self.queue.set_busy(true);
            self.running = Some(entry.block);
            if let Some(bm) = self.graph.block_mut(entry.block) {
                bm.clear_transcript();
            }
            self.set_state(entry.block, RunState::Running, step);
            step.dispatched = Some(entry);
            return;
        }
        if self.running.is_none() {
            self.finish_cycle(step);
        }
    }

    /// End the active cycle: release the stages and reset edge mirrors.
    fn finish_cycle(&mut self, step: &mut SchedulerStep) {
        if self.stages.is_empty() {
            return;
        }
        let edges = staged_edges(&self.stages);
        for edge in edges {
            if let Some(e) = self.graph.edge_mut(edge) {
                e.set_run_state(RunState::Idle);
            }
        }
        self.stages.clear();
        step.cycle_finished = true;
        info!("run cycle finished");
    }

    fn reset_block(&mut self, block: BlockId, step: &mut SchedulerStep) {
        if let Some(b) = self.graph.block_mut(block) {
            b.set_has_been_run(false);
        }
        self.set_state(block, RunState::Idle, step);
    }

    fn set_state(&mut self, block: BlockId, state: RunState, step: &mut SchedulerStep) {
        if let Some(b) = self.graph.block_mut(block) {
            if b.run_state() != state {
                b.set_run_state(state);
                step.state_changes.push((block, state));
            }
        }
    }
}

fn staged_edges(stages: &[Stage]) -> Vec<EdgeId> {
    stages
        .iter()
        .filter_map(|stage| match stage {
            Stage::Edges(edges) => Some(edges.iter().copied()),
            Stage::Blocks(_) => None,
        })
        .flatten()
        .collect()
}

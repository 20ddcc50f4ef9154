// src/lib.rs

pub mod engine;
pub mod errors;
pub mod graph;
pub mod kernel;
pub mod logging;
pub mod sched;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{CoreRuntime, Notification, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::Result;
use crate::graph::{BlockId, Graph};
use crate::kernel::SubprocessKernel;
use crate::sched::Scheduler;

/// Cloneable handle for the editor layer.
///
/// Exposes the only mutating entry points into the scheduler; everything
/// else observes state through the notification channel. All calls are
/// marshaled onto the runtime's single event loop, so the editor never
/// touches queue or block state directly.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl SchedulerClient {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    /// Run a block and everything it depends on.
    pub async fn run_left(&self, block: BlockId) -> Result<()> {
        self.send(RuntimeEvent::RunLeft { block }).await
    }

    /// Re-run every block depending on this one.
    pub async fn run_right(&self, block: BlockId) -> Result<()> {
        self.send(RuntimeEvent::RunRight { block }).await
    }

    /// Replace a code block's source, invalidating its downstream closure.
    pub async fn edit_source(&self, block: BlockId, source: impl Into<String>) -> Result<()> {
        self.send(RuntimeEvent::SourceEdited {
            block,
            source: source.into(),
        })
        .await
    }

    /// Move a slider block, invalidating its downstream closure.
    pub async fn move_slider(&self, block: BlockId, value: f64) -> Result<()> {
        self.send(RuntimeEvent::SliderMoved { block, value }).await
    }

    /// Cancel the active run cycle.
    pub async fn interrupt_execution(&self) -> Result<()> {
        self.send(RuntimeEvent::InterruptRequested).await
    }

    /// Ask the runtime loop to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::ShutdownRequested).await
    }

    async fn send(&self, event: RuntimeEvent) -> Result<()> {
        debug!(?event, "client sending event");
        self.tx.send(event).await.map_err(anyhow::Error::from)?;
        Ok(())
    }
}

/// High-level entry point used by editor frontends.
///
/// This wires together:
/// - scheduler over the given graph
/// - core runtime + async shell
/// - the subprocess kernel backend
/// - the notification channel for rendering feedback
///
/// Must be called from within a Tokio runtime. Returns the client handle,
/// the notification receiver, and the join handle of the runtime loop.
pub fn launch(
    graph: Graph,
    options: RuntimeOptions,
) -> (
    SchedulerClient,
    mpsc::Receiver<Notification>,
    JoinHandle<Result<()>>,
) {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (notify_tx, notify_rx) = mpsc::channel::<Notification>(64);

    let kernel = SubprocessKernel::new(rt_tx.clone());
    let core = CoreRuntime::new(Scheduler::new(graph), options);
    let runtime = Runtime::new(core, rt_rx, kernel).with_notifications(notify_tx);

    let handle = tokio::spawn(runtime.run());

    (SchedulerClient::new(rt_tx), notify_rx, handle)
}

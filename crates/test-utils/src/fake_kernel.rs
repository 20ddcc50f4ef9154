use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use blockflow::engine::{ExecOutcome, RuntimeEvent};
use blockflow::errors::Result;
use blockflow::graph::BlockId;
use blockflow::kernel::KernelBackend;
use blockflow::sched::QueuedExecution;

/// A fake kernel that:
/// - records which blocks were "executed"
/// - immediately reports `ExecFinished` for each submission, succeeding
///   unless the block was registered as failing.
pub struct FakeKernel {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<BlockId>>>,
    failing: HashSet<BlockId>,
    interrupts: Arc<Mutex<u32>>,
}

impl FakeKernel {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<BlockId>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
            interrupts: Arc::new(Mutex::new(0)),
        }
    }

    /// Make submissions for the given blocks report an error outcome.
    pub fn with_failures(mut self, failing: impl IntoIterator<Item = BlockId>) -> Self {
        self.failing = failing.into_iter().collect();
        self
    }

    /// Shared counter of interrupt requests received.
    pub fn interrupt_counter(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.interrupts)
    }
}

impl KernelBackend for FakeKernel {
    fn submit(
        &mut self,
        exec: QueuedExecution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let outcome = if self.failing.contains(&exec.block) {
            ExecOutcome::Error("fake kernel failure".to_string())
        } else {
            ExecOutcome::Success
        };

        Box::pin(async move {
            {
                let mut guard = executed.lock().unwrap();
                guard.push(exec.block);
            }

            tx.send(RuntimeEvent::ExecFinished {
                block: exec.block,
                outcome,
            })
            .await
            .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }

    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let interrupts = Arc::clone(&self.interrupts);
        Box::pin(async move {
            let mut guard = interrupts.lock().unwrap();
            *guard += 1;
            Ok(())
        })
    }
}

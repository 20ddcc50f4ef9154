// src/kernel/backend.rs

//! Pluggable kernel backend abstraction.
//!
//! The runtime talks to a `KernelBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake kernel in tests while keeping the
//! production subprocess implementation in [`subprocess`].
//!
//! - `SubprocessKernel` is the default implementation. It wraps the
//!   background kernel loop and just forwards submissions over an mpsc
//!   channel.
//! - Tests can provide their own `KernelBackend` that, for example, records
//!   which blocks were submitted and directly emits `ExecFinished` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::sched::QueuedExecution;

use super::subprocess::{spawn_kernel, KernelRequest};

/// Trait abstracting how submissions reach the kernel.
///
/// The scheduler guarantees at most one submission is in flight at a time;
/// a backend that is itself shared must still serialize internally.
pub trait KernelBackend: Send {
    /// Begin asynchronous execution of one submission.
    fn submit(
        &mut self,
        exec: QueuedExecution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Best-effort request to abort the currently executing submission.
    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production kernel backend running code in child processes.
///
/// Internally, this just wraps the background loop in [`spawn_kernel`]. The
/// runtime calls `submit` / `interrupt`, which forward the request to the
/// kernel loop via an mpsc channel.
pub struct SubprocessKernel {
    tx: mpsc::Sender<KernelRequest>,
}

impl SubprocessKernel {
    /// Create a new subprocess kernel, wiring it to the given runtime event
    /// sender.
    ///
    /// This spawns the background kernel loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let tx = spawn_kernel(runtime_tx);
        Self { tx }
    }
}

impl KernelBackend for SubprocessKernel {
    fn submit(
        &mut self,
        exec: QueuedExecution,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            tx.send(KernelRequest::Submit(exec))
                .await
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }

    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            tx.send(KernelRequest::Interrupt)
                .await
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}

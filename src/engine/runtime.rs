// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::kernel::KernelBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, Notification, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates code
/// execution to a `KernelBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// scheduling semantics. Kernel completions arrive on the same event
/// channel as editor triggers, so every mutation of scheduler state is
/// marshaled onto this single loop; that is the whole concurrency story.
pub struct Runtime<K: KernelBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    kernel: K,
    notify_tx: Option<mpsc::Sender<Notification>>,
}

impl<K: KernelBackend> fmt::Debug for Runtime<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<K: KernelBackend> Runtime<K> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, kernel: K) -> Self {
        Self {
            core,
            event_rx,
            kernel,
            notify_tx: None,
        }
    }

    /// Forward editor notifications over the given channel.
    pub fn with_notifications(mut self, notify_tx: mpsc::Sender<Notification>) -> Self {
        self.notify_tx = Some(notify_tx);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (submit, interrupt, notify,
    ///   exit).
    pub async fn run(mut self) -> Result<()> {
        info!("blockflow runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::SubmitToKernel(exec) => {
                debug!(block = ?exec.block, "submitting to kernel");
                self.kernel.submit(exec).await?;
            }
            CoreCommand::InterruptKernel => {
                self.kernel.interrupt().await?;
            }
            CoreCommand::Notify(notification) => {
                if let Some(tx) = &self.notify_tx {
                    // Notifications are best-effort; a closed channel is ignored.
                    let _ = tx.send(notification).await;
                }
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}

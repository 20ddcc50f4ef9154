// src/kernel/subprocess.rs

//! Background kernel loop driving one child process per submission.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::engine::{ExecOutcome, RuntimeEvent};
use crate::graph::OutputChunk;
use crate::sched::QueuedExecution;

/// Requests accepted by the kernel loop.
#[derive(Debug)]
pub enum KernelRequest {
    /// Execute one submission's code.
    Submit(QueuedExecution),
    /// Abort the currently executing submission, if any.
    Interrupt,
}

/// Internal handle for the currently-executing submission.
///
/// - `cancel` is used to request that the child process be stopped (the
///   interrupt path).
/// - `handle` is the Tokio task actually running the code.
struct ActiveSubmission {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background kernel loop.
///
/// The returned `mpsc::Sender<KernelRequest>` is what `SubprocessKernel`
/// uses. The loop executes at most one submission at a time; the scheduler
/// upstream already guarantees it never submits while one is in flight, so
/// an overlapping submit here means state was corrupted somewhere and the
/// previous instance is cancelled before the new one starts.
pub fn spawn_kernel(runtime_tx: mpsc::Sender<RuntimeEvent>) -> mpsc::Sender<KernelRequest> {
    let (tx, mut rx) = mpsc::channel::<KernelRequest>(32);

    tokio::spawn(async move {
        info!("kernel loop started");

        let mut active: Option<ActiveSubmission> = None;

        while let Some(request) = rx.recv().await {
            match request {
                KernelRequest::Submit(exec) => {
                    handle_submission(exec, &mut active, &runtime_tx).await;
                }
                KernelRequest::Interrupt => {
                    interrupt_active(&mut active);
                }
            }
        }

        info!("kernel loop finished (channel closed)");
    });

    tx
}

/// Start executing a newly submitted work item.
async fn handle_submission(
    exec: QueuedExecution,
    active: &mut Option<ActiveSubmission>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    if let Some(existing) = active.as_mut() {
        if !existing.handle.is_finished() {
            warn!(
                block = ?exec.block,
                "submission while previous execution still active; cancelling it"
            );
            if let Some(cancel) = existing.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let block = exec.block;

    let handle = tokio::spawn(async move {
        run_submission(exec, rt_tx, cancel_rx).await;
        debug!(?block, "submission runner future finished");
    });

    *active = Some(ActiveSubmission {
        cancel: Some(cancel_tx),
        handle,
    });
}

/// Abort the currently executing submission, if any.
fn interrupt_active(active: &mut Option<ActiveSubmission>) {
    match active.as_mut() {
        Some(existing) => {
            if let Some(cancel) = existing.cancel.take() {
                info!("interrupt requested; cancelling current submission");
                if cancel.send(()).is_err() {
                    debug!("submission already finished while interrupting");
                }
            } else {
                debug!("no cancel sender present; submission may already be cancelled");
            }
        }
        None => {
            debug!("interrupt requested with no active submission");
        }
    }
}

/// Run a single submission's code, streaming stdout back as output chunks
/// and emitting exactly one `ExecFinished` on success/failure.
///
/// If the cancel channel fires, the child process is killed and **no**
/// terminal event is sent for that instance: the scheduler has already
/// reset the block, and a completion from a cancelled run would only
/// confuse it.
async fn run_submission(
    exec: QueuedExecution,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let block = exec.block;
    if let Err(err) = run_submission_inner(exec, &runtime_tx, cancel_rx).await {
        error!(?block, error = %err, "kernel submission error");
        let _ = runtime_tx
            .send(RuntimeEvent::ExecFinished {
                block,
                outcome: ExecOutcome::Error(err.to_string()),
            })
            .await;
    }
}

async fn run_submission_inner(
    exec: QueuedExecution,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<()> {
    info!(block = ?exec.block, "starting kernel submission");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&exec.code);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&exec.code);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning kernel process for block {:?}", exec.block))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Stream stdout lines back to the runtime as incremental output.
    if let Some(stdout) = stdout {
        let tx = runtime_tx.clone();
        let block = exec.block;
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx
                    .send(RuntimeEvent::ExecOutput {
                        block,
                        chunk: OutputChunk::Text(line),
                    })
                    .await;
            }
        });
    }

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = stderr {
        let block = exec.block;
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                debug!(?block, "stderr: {}", line);
            }
        });
    }

    // Either the process exits on its own (normal case), or we receive a
    // cancellation request from the interrupt path.
    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for kernel process of block {:?}", exec.block))?;

            let code = status.code().unwrap_or(-1);
            let outcome = if status.success() {
                ExecOutcome::Success
            } else {
                ExecOutcome::Error(format!("kernel process exited with code {code}"))
            };

            info!(
                block = ?exec.block,
                exit_code = code,
                success = status.success(),
                "kernel submission finished"
            );

            runtime_tx
                .send(RuntimeEvent::ExecFinished {
                    block: exec.block,
                    outcome,
                })
                .await
                .with_context(|| {
                    format!("sending ExecFinished event for block {:?} to runtime", exec.block)
                })?;
        }

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(block = ?exec.block, "cancellation requested; killing kernel process");
                    if let Err(e) = child.kill().await {
                        warn!(
                            block = ?exec.block,
                            error = %e,
                            "failed to kill kernel process on cancellation"
                        );
                    }
                    // Do NOT send ExecFinished for this cancelled instance.
                }
                Err(e) => {
                    debug!(
                        block = ?exec.block,
                        error = %e,
                        "cancel channel closed without explicit cancellation"
                    );
                    // Child will be killed on drop due to kill_on_drop(true).
                }
            }
        }
    }

    Ok(())
}

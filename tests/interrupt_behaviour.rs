// tests/interrupt_behaviour.rs

//! Interrupt semantics exercised through the full runtime loop with a
//! kernel whose completions the test controls.

use std::collections::HashMap;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use blockflow::engine::{
    CoreRuntime, ExecOutcome, Notification, Runtime, RuntimeEvent, RuntimeOptions,
};
use blockflow::errors::Result as BfResult;
use blockflow::graph::BlockId;
use blockflow::kernel::KernelBackend;
use blockflow::sched::{QueuedExecution, RunState, Scheduler};
use blockflow_test_utils::builders::GraphBuilder;
use blockflow_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// A kernel that holds every submission until the test allows it to
/// complete, so the test can interrupt mid-flight deterministically.
struct ControllableKernel {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    started: Arc<Mutex<Vec<BlockId>>>,
    completion_signals: Arc<Mutex<HashMap<BlockId, Arc<Notify>>>>,
    interrupts: Arc<Mutex<u32>>,
}

impl ControllableKernel {
    fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            started: Arc::new(Mutex::new(Vec::new())),
            completion_signals: Arc::new(Mutex::new(HashMap::new())),
            interrupts: Arc::new(Mutex::new(0)),
        }
    }

    fn allow_completion(signals: &Arc<Mutex<HashMap<BlockId, Arc<Notify>>>>, block: BlockId) {
        let map = signals.lock().unwrap();
        if let Some(notify) = map.get(&block) {
            notify.notify_one();
        }
    }
}

impl KernelBackend for ControllableKernel {
    fn submit(
        &mut self,
        exec: QueuedExecution,
    ) -> Pin<Box<dyn Future<Output = BfResult<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let started = Arc::clone(&self.started);
        let signals = Arc::clone(&self.completion_signals);

        Box::pin(async move {
            // Run the submission in a background task so the runtime loop
            // keeps draining events while it is "executing".
            tokio::spawn(async move {
                // Register the completion signal before announcing the
                // start, so `allow_completion` after `wait_for_start`
                // always finds it.
                let notify = {
                    let mut map = signals.lock().unwrap();
                    map.entry(exec.block)
                        .or_insert_with(|| Arc::new(Notify::new()))
                        .clone()
                };

                {
                    let mut guard = started.lock().unwrap();
                    guard.push(exec.block);
                }

                notify.notified().await;

                let _ = tx
                    .send(RuntimeEvent::ExecFinished {
                        block: exec.block,
                        outcome: ExecOutcome::Success,
                    })
                    .await;
            });
            Ok(())
        })
    }

    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = BfResult<()>> + Send + '_>> {
        let interrupts = Arc::clone(&self.interrupts);
        Box::pin(async move {
            let mut guard = interrupts.lock().unwrap();
            *guard += 1;
            Ok(())
        })
    }
}

async fn wait_for_start(started: &Arc<Mutex<Vec<BlockId>>>, block: BlockId, occurrences: usize) {
    for _ in 0..100 {
        {
            let guard = started.lock().unwrap();
            if guard.iter().filter(|&&b| b == block).count() >= occurrences {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Block {block:?} did not start (occurrence {occurrences})");
}

fn drain_notifications(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut notes = Vec::new();
    while let Ok(n) = rx.try_recv() {
        notes.push(n);
    }
    notes
}

/// Interrupt through the runtime: X running and Y queued, interrupt resets
/// both to idle, forwards the interrupt to the kernel, ignores the stale
/// completion, and accepts a fresh run afterwards.
#[tokio::test]
async fn interrupt_resets_inflight_cycle() -> TestResult {
    init_tracing();

    let (graph, ids) = GraphBuilder::new()
        .code_block("X", "x")
        .code_block("Y", "y")
        .wire("X", "Y")
        .build();
    let (x, y) = (ids["X"], ids["Y"]);

    let scheduler = Scheduler::new(graph);
    let options = RuntimeOptions {
        exit_when_idle: false,
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let (notify_tx, mut notify_rx) = mpsc::channel::<Notification>(64);

    let kernel = ControllableKernel::new(rt_tx.clone());
    let started = Arc::clone(&kernel.started);
    let signals = Arc::clone(&kernel.completion_signals);
    let interrupts = Arc::clone(&kernel.interrupts);

    let core = CoreRuntime::new(scheduler, options);
    let runtime = Runtime::new(core, rt_rx, kernel).with_notifications(notify_tx);
    let runtime_handle = tokio::spawn(runtime.run());

    // Start a run: X dispatches, Y stays queued behind it.
    rt_tx.send(RuntimeEvent::RunLeft { block: y }).await?;
    wait_for_start(&started, x, 1).await;

    rt_tx.send(RuntimeEvent::InterruptRequested).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*interrupts.lock().unwrap(), 1);

    let notes = drain_notifications(&mut notify_rx);
    assert!(notes.contains(&Notification::BlockState {
        block: x,
        state: RunState::Idle
    }));
    assert!(notes.contains(&Notification::BlockState {
        block: y,
        state: RunState::Idle
    }));
    assert!(notes.contains(&Notification::CycleFinished));

    // The killed submission reporting back late must be ignored: no new
    // dispatch, no state change.
    ControllableKernel::allow_completion(&signals, x);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let notes = drain_notifications(&mut notify_rx);
    assert!(notes.is_empty(), "stale completion produced {notes:?}");
    assert_eq!(started.lock().unwrap().len(), 1);

    // A fresh run is accepted and completes normally.
    rt_tx.send(RuntimeEvent::RunLeft { block: y }).await?;
    wait_for_start(&started, x, 2).await;
    ControllableKernel::allow_completion(&signals, x);
    wait_for_start(&started, y, 1).await;
    ControllableKernel::allow_completion(&signals, y);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let notes = drain_notifications(&mut notify_rx);
    assert!(notes.contains(&Notification::BlockState {
        block: y,
        state: RunState::Done
    }));
    assert!(notes.contains(&Notification::CycleFinished));

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    let _ = timeout(Duration::from_secs(1), runtime_handle).await;

    Ok(())
}

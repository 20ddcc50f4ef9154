// tests/launch_subprocess.rs

//! Full-stack test: `launch` wiring with the real subprocess kernel.

use std::error::Error;
use std::time::Duration;

use tokio::time::timeout;

use blockflow::engine::{Notification, RuntimeOptions};
use blockflow::graph::OutputChunk;
use blockflow::sched::RunState;
use blockflow_test_utils::builders::GraphBuilder;
use blockflow_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn launch_runs_shell_code_end_to_end() -> TestResult {
    init_tracing();

    let (graph, ids) = GraphBuilder::new()
        .code_block("A", "echo hello")
        .build();
    let a = ids["A"];

    let (client, mut notify_rx, runtime_handle) =
        blockflow::launch(graph, RuntimeOptions::default());

    client.run_left(a).await?;

    // The stdout reader and the process waiter are independent tasks, so
    // the output chunk and the terminal state may arrive in either order.
    let mut saw_output = false;
    let mut saw_done = false;
    while !(saw_output && saw_done) {
        let note = timeout(Duration::from_secs(5), notify_rx.recv())
            .await
            .expect("timed out waiting for notifications")
            .expect("notification channel closed early");
        match note {
            Notification::Output { block, chunk } if block == a => {
                assert_eq!(chunk, OutputChunk::Text("hello".to_string()));
                saw_output = true;
            }
            Notification::BlockState { block, state } if block == a => {
                assert_ne!(state, RunState::Crashed);
                if state == RunState::Done {
                    saw_done = true;
                }
            }
            _ => {}
        }
    }

    client.shutdown().await?;
    let _ = timeout(Duration::from_secs(1), runtime_handle).await;

    Ok(())
}

#[tokio::test]
async fn launch_reports_failing_shell_code_as_crash() -> TestResult {
    init_tracing();

    let (graph, ids) = GraphBuilder::new()
        .code_block("A", "exit 3")
        .build();
    let a = ids["A"];

    let (client, mut notify_rx, runtime_handle) =
        blockflow::launch(graph, RuntimeOptions::default());

    client.run_left(a).await?;

    loop {
        let note = timeout(Duration::from_secs(5), notify_rx.recv())
            .await
            .expect("timed out waiting for notifications")
            .expect("notification channel closed early");
        if let Notification::BlockState { block, state } = note {
            if block == a && state.is_terminal() {
                assert_eq!(state, RunState::Crashed);
                break;
            }
        }
    }

    client.shutdown().await?;
    let _ = timeout(Duration::from_secs(1), runtime_handle).await;

    Ok(())
}

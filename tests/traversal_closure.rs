// tests/traversal_closure.rs

//! Closure and staged-span behaviour of the traversal engine, plus the
//! graph model invariants it relies on.

use blockflow::errors::BlockflowError;
use blockflow::graph::{
    staged_span, upstream_closure, BlockId, BlockKind, Direction, EdgeId, Graph, Stage,
};
use blockflow_test_utils::init_tracing;

fn code(graph: &mut Graph, source: &str) -> BlockId {
    graph.add_block(BlockKind::Code {
        code: source.to_string(),
    })
}

fn wire(graph: &mut Graph, from: BlockId, to: BlockId) -> EdgeId {
    let out = graph.block(from).expect("known block").outputs()[0];
    let inp = graph.block(to).expect("known block").inputs()[0];
    graph.connect(out, inp).expect("valid wiring")
}

/// Chain A -> B -> C: the upstream closure of C is [B, A] (nearest first)
/// and the stages alternate blocks and edges outward from C.
#[test]
fn chain_upstream_closure_order_and_stages() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a = 1");
    let b = code(&mut graph, "b = a + 1");
    let c = code(&mut graph, "c = b + 1");
    let e_ab = wire(&mut graph, a, b);
    let e_bc = wire(&mut graph, b, c);

    let closure = upstream_closure(&graph, c, Direction::Upstream).unwrap();

    assert_eq!(closure.blocks_to_run, vec![b, a]);
    assert_eq!(
        closure.stages,
        vec![
            Stage::Blocks(vec![c]),
            Stage::Edges(vec![e_bc]),
            Stage::Blocks(vec![b]),
            Stage::Edges(vec![e_ab]),
            Stage::Blocks(vec![a]),
        ]
    );
}

/// In a diamond with a shortcut edge, every ancestor appears exactly
/// once and the start block never appears at all.
#[test]
fn diamond_closure_reports_each_ancestor_once() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let c = code(&mut graph, "c");
    let d = code(&mut graph, "d");
    wire(&mut graph, a, b);
    wire(&mut graph, a, c);
    wire(&mut graph, b, d);
    wire(&mut graph, c, d);
    wire(&mut graph, a, d); // shortcut: A is reachable at two depths

    let closure = upstream_closure(&graph, d, Direction::Upstream).unwrap();

    assert_eq!(closure.blocks_to_run.len(), 3);
    for block in [a, b, c] {
        let count = closure
            .blocks_to_run
            .iter()
            .filter(|&&id| id == block)
            .count();
        assert_eq!(count, 1, "block {block:?} should appear exactly once");
    }
    assert!(!closure.blocks_to_run.contains(&d));
}

/// The downstream direction walks output sockets symmetrically.
#[test]
fn downstream_closure_of_chain_head() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let c = code(&mut graph, "c");
    wire(&mut graph, a, b);
    wire(&mut graph, b, c);

    let closure = upstream_closure(&graph, a, Direction::Downstream).unwrap();
    assert_eq!(closure.blocks_to_run, vec![b, c]);
}

/// Disabling a socket cuts its edges for scheduling purposes
/// without deleting them.
#[test]
fn disabled_socket_excludes_edge_from_closure() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let c = code(&mut graph, "c");
    let e_ab = wire(&mut graph, a, b);
    wire(&mut graph, b, c);

    let a_out = graph.block(a).unwrap().outputs()[0];
    graph.set_socket_enabled(a_out, false);

    let closure = upstream_closure(&graph, c, Direction::Upstream).unwrap();
    assert_eq!(closure.blocks_to_run, vec![b]);

    // The edge still exists; re-enabling restores it.
    assert!(graph.edge(e_ab).is_some());
    graph.set_socket_enabled(a_out, true);
    let closure = upstream_closure(&graph, c, Direction::Upstream).unwrap();
    assert_eq!(closure.blocks_to_run, vec![b, a]);
}

/// A cyclic execution-flow graph fails fast instead of hanging.
#[test]
fn cyclic_graph_is_rejected() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    wire(&mut graph, a, b);
    wire(&mut graph, b, a);

    let err = upstream_closure(&graph, a, Direction::Upstream).unwrap_err();
    assert!(matches!(err, BlockflowError::CyclicGraph(_)));
}

/// The staged span of a right-run explores upstream and downstream in the
/// same rounds, and dependencies of downstream discoveries join later
/// rounds.
#[test]
fn staged_span_reaches_dependencies_of_dependents() {
    init_tracing();

    // A -> B -> D, A -> C -> D, X -> C. From A, the span must reach X
    // (a dependency of the dependent C) on a later round.
    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let c = code(&mut graph, "c");
    let d = code(&mut graph, "d");
    let x = code(&mut graph, "x");
    let e_ab = wire(&mut graph, a, b);
    let e_ac = wire(&mut graph, a, c);
    let e_bd = wire(&mut graph, b, d);
    let e_cd = wire(&mut graph, c, d);
    let e_xc = wire(&mut graph, x, c);

    let stages = staged_span(&graph, a).unwrap();

    assert_eq!(stages[0], Stage::Blocks(vec![a]));
    assert_eq!(stages[1], Stage::Edges(vec![e_ab, e_ac]));
    assert_eq!(stages[2], Stage::Blocks(vec![b, c]));
    assert_eq!(stages[3], Stage::Edges(vec![e_xc, e_bd, e_cd]));
    assert_eq!(stages[4], Stage::Blocks(vec![x, d]));
    assert_eq!(stages.len(), 5);
}

/// Every edge and block appears at most once in a staged span.
#[test]
fn staged_span_visits_each_entity_once() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let c = code(&mut graph, "c");
    let d = code(&mut graph, "d");
    wire(&mut graph, a, b);
    wire(&mut graph, a, c);
    wire(&mut graph, b, d);
    wire(&mut graph, c, d);

    let stages = staged_span(&graph, a).unwrap();

    let mut seen_blocks = Vec::new();
    let mut seen_edges = Vec::new();
    for stage in &stages {
        match stage {
            Stage::Blocks(blocks) => seen_blocks.extend(blocks.iter().copied()),
            Stage::Edges(edges) => seen_edges.extend(edges.iter().copied()),
        }
    }
    let block_count = seen_blocks.len();
    let edge_count = seen_edges.len();
    seen_blocks.sort();
    seen_blocks.dedup();
    seen_edges.sort();
    seen_edges.dedup();
    assert_eq!(seen_blocks.len(), block_count);
    assert_eq!(seen_edges.len(), edge_count);
}

/// Connection rules: same block and same socket kind are rejected; the
/// stored edge always runs output -> input regardless of argument order.
#[test]
fn connect_validates_and_normalises() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let a_in = graph.block(a).unwrap().inputs()[0];
    let a_out = graph.block(a).unwrap().outputs()[0];
    let b_in = graph.block(b).unwrap().inputs()[0];
    let b_out = graph.block(b).unwrap().outputs()[0];

    let err = graph.connect(a_out, a_in).unwrap_err();
    assert!(matches!(err, BlockflowError::InvalidConnection(_)));

    let err = graph.connect(a_out, b_out).unwrap_err();
    assert!(matches!(err, BlockflowError::InvalidConnection(_)));

    let err = graph.connect(a_in, b_in).unwrap_err();
    assert!(matches!(err, BlockflowError::InvalidConnection(_)));

    // Dragged from the input end: still stored as A -> B.
    let edge = graph.connect(b_in, a_out).unwrap();
    assert_eq!(graph.edge_source_block(edge), Some(a));
    assert_eq!(graph.edge_destination_block(edge), Some(b));
}

/// Removing a socket cascades to its edges; disconnect is idempotent.
#[test]
fn socket_removal_cascades_and_disconnect_is_idempotent() {
    init_tracing();

    let mut graph = Graph::new();
    let a = code(&mut graph, "a");
    let b = code(&mut graph, "b");
    let edge = wire(&mut graph, a, b);

    graph.disconnect(edge);
    assert!(graph.edge(edge).is_none());
    graph.disconnect(edge); // no-op

    let edge = wire(&mut graph, a, b);
    let b_in = graph.block(b).unwrap().inputs()[0];
    graph.remove_socket(b_in);
    assert!(graph.edge(edge).is_none());
    assert!(graph.block(b).unwrap().inputs().is_empty());
    let a_out = graph.block(a).unwrap().outputs()[0];
    assert!(graph.socket(a_out).unwrap().edges().is_empty());
}

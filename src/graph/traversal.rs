// src/graph/traversal.rs

//! Directional closure algorithms over the execution-flow graph.
//!
//! These are pure functions: they read the graph and produce orderings, and
//! never touch run state. Two outputs matter to callers:
//!
//! - `blocks_to_run`: the blocks a run cycle must execute, in discovery
//!   order (nearest first; callers reverse it when dependencies must run
//!   before dependents).
//! - `stages`: the alternating block/edge groups the editor animates to show
//!   a run cycle spreading through the graph. Stage contents and order are
//!   contractual; timing is the editor's business.
//!
//! Edges with a disabled endpoint socket are invisible to every traversal.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{BlockflowError, Result};
use crate::graph::model::{BlockId, EdgeId, Graph};

/// Which way a closure walks the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow input sockets toward the blocks feeding the start.
    Upstream,
    /// Follow output sockets toward the blocks depending on the start.
    Downstream,
}

/// One unit of the staged notification sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Blocks(Vec<BlockId>),
    Edges(Vec<EdgeId>),
}

/// Result of a directional closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    /// Every block reachable from the start in the requested direction,
    /// each exactly once, nearest first. The start itself is excluded.
    pub blocks_to_run: Vec<BlockId>,
    /// Alternating block/edge stages, seeded with the start block.
    pub stages: Vec<Stage>,
}

/// Compute the set and order of blocks connected to `start` in one
/// direction, together with the staged groups for progress feedback.
///
/// Fails with [`BlockflowError::CyclicGraph`] when the reachable
/// enabled-edge subgraph contains a cycle; the editor is expected to keep
/// execution flow acyclic, but a malformed document must not hang the
/// scheduler.
pub fn upstream_closure(graph: &Graph, start: BlockId, direction: Direction) -> Result<Closure> {
    if graph.block(start).is_none() {
        return Err(BlockflowError::UnknownBlock(start));
    }
    ensure_acyclic(graph, start, direction)?;

    let mut blocks_to_run = Vec::new();
    let mut stages = vec![Stage::Blocks(vec![start])];
    let mut visited: HashSet<BlockId> = HashSet::from([start]);
    let mut frontier = vec![start];

    while !frontier.is_empty() {
        let mut round_edges = Vec::new();
        for &block in &frontier {
            blocks_to_run.push(block);
            round_edges.extend(edges_from(graph, block, direction));
        }
        if round_edges.is_empty() {
            break;
        }
        stages.push(Stage::Edges(round_edges.clone()));

        let mut next = Vec::new();
        for edge in round_edges {
            let Some(far) = far_block(graph, edge, direction) else {
                continue;
            };
            if visited.insert(far) {
                next.push(far);
            }
        }
        stages.push(Stage::Blocks(next.clone()));
        frontier = next;
    }

    // The start is reported separately by the caller, never as its own
    // dependency.
    blocks_to_run.remove(0);

    debug!(
        ?start,
        ?direction,
        blocks = blocks_to_run.len(),
        stages = stages.len(),
        "computed closure"
    );
    Ok(Closure {
        blocks_to_run,
        stages,
    })
}

/// Staged bidirectional traversal used by a right-run for notification
/// ordering.
///
/// Input and output frontiers are explored independently within the same
/// round; every edge and block is visited at most once. Blocks discovered
/// downstream join *both* frontiers, so their own dependencies are explored
/// upstream in later rounds. Terminates when both frontiers are empty.
pub fn staged_span(graph: &Graph, start: BlockId) -> Result<Vec<Stage>> {
    if graph.block(start).is_none() {
        return Err(BlockflowError::UnknownBlock(start));
    }

    let mut stages = vec![Stage::Blocks(vec![start])];
    let mut visited_blocks: HashSet<BlockId> = HashSet::from([start]);
    let mut visited_edges: HashSet<EdgeId> = HashSet::new();
    let mut in_frontier = vec![start];
    let mut out_frontier = vec![start];

    while !in_frontier.is_empty() || !out_frontier.is_empty() {
        let mut round_edges = Vec::new();
        let mut round_blocks = Vec::new();
        let mut next_in = Vec::new();
        let mut next_out = Vec::new();

        for &block in &in_frontier {
            for edge in edges_from(graph, block, Direction::Upstream) {
                if !visited_edges.insert(edge) {
                    continue;
                }
                round_edges.push(edge);
                let Some(far) = far_block(graph, edge, Direction::Upstream) else {
                    continue;
                };
                if visited_blocks.insert(far) {
                    round_blocks.push(far);
                    next_in.push(far);
                }
            }
        }

        for &block in &out_frontier {
            for edge in edges_from(graph, block, Direction::Downstream) {
                if !visited_edges.insert(edge) {
                    continue;
                }
                round_edges.push(edge);
                let Some(far) = far_block(graph, edge, Direction::Downstream) else {
                    continue;
                };
                if visited_blocks.insert(far) {
                    round_blocks.push(far);
                    // Downstream discoveries are explored both ways from
                    // here on, so their dependencies are reached as well.
                    next_in.push(far);
                    next_out.push(far);
                }
            }
        }

        if round_edges.is_empty() {
            break;
        }
        stages.push(Stage::Edges(round_edges));
        stages.push(Stage::Blocks(round_blocks));
        in_frontier = next_in;
        out_frontier = next_out;
    }

    debug!(?start, stages = stages.len(), "computed staged span");
    Ok(stages)
}

/// Enabled edges leaving `block` in the given direction.
fn edges_from(graph: &Graph, block: BlockId, direction: Direction) -> Vec<EdgeId> {
    match direction {
        Direction::Upstream => graph.enabled_edges_into(block),
        Direction::Downstream => graph.enabled_edges_out_of(block),
    }
}

/// The block at the far end of an edge relative to the walk direction.
fn far_block(graph: &Graph, edge: EdgeId, direction: Direction) -> Option<BlockId> {
    match direction {
        Direction::Upstream => graph.edge_source_block(edge),
        Direction::Downstream => graph.edge_destination_block(edge),
    }
}

/// Fail fast when the enabled-edge subgraph reachable from `start` has a
/// cycle. A topological sort over the reachable blocks does the detection.
fn ensure_acyclic(graph: &Graph, start: BlockId, direction: Direction) -> Result<()> {
    let mut reachable: HashSet<BlockId> = HashSet::from([start]);
    let mut stack = vec![start];
    let mut sub: DiGraphMap<BlockId, ()> = DiGraphMap::new();
    sub.add_node(start);

    while let Some(block) = stack.pop() {
        for edge in edges_from(graph, block, direction) {
            let Some(far) = far_block(graph, edge, direction) else {
                continue;
            };
            match direction {
                Direction::Upstream => {
                    sub.add_edge(far, block, ());
                }
                Direction::Downstream => {
                    sub.add_edge(block, far, ());
                }
            }
            if reachable.insert(far) {
                stack.push(far);
            }
        }
    }

    match toposort(&sub, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BlockflowError::CyclicGraph(cycle.node_id())),
    }
}

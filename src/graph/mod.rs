// src/graph/mod.rs

//! Execution-flow graph: blocks, sockets and edges.
//!
//! - [`model`] owns the blocks, their execution sockets and the directed
//!   edges between them, and answers the adjacency queries the traversal
//!   engine needs.
//! - [`traversal`] contains the pure directional closure algorithms that
//!   compute run order and the staged sequences used for progress
//!   notification.

pub mod model;
pub mod traversal;

pub use model::{
    Block, BlockId, BlockKind, Edge, EdgeId, FlowKind, Graph, OutputChunk, Socket, SocketId,
    SocketKind,
};
pub use traversal::{staged_span, upstream_closure, Closure, Direction, Stage};

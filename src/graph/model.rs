// src/graph/model.rs

//! In-memory model of the executable block graph.
//!
//! The [`Graph`] owns every block, socket and edge, keyed by id. Entities
//! refer to each other through ids only, so removal can cascade without
//! fighting the borrow checker, and ids stay stable for the editor layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{BlockflowError, Result};
use crate::sched::RunState;

/// Identifier of a block within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Identifier of a socket within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SocketId(pub u64);

/// Identifier of an edge within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Whether a socket accepts incoming or produces outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketKind {
    Input,
    Output,
}

/// The flow discipline of a socket.
///
/// Only execution-flow sockets exist at this layer; data sockets belong to
/// the editor's value-passing machinery, which sits outside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Exe,
}

/// A typed connection point on a block.
///
/// Execution sockets hold any number of edges. Disabling a socket excludes
/// all of its edges from every traversal without deleting them.
#[derive(Debug, Clone)]
pub struct Socket {
    id: SocketId,
    block: BlockId,
    kind: SocketKind,
    flow: FlowKind,
    enabled: bool,
    edges: Vec<EdgeId>,
}

impl Socket {
    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Edges attached to this socket, in attachment order.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// A directed connection from an output socket to an input socket.
#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    source: SocketId,
    destination: SocketId,
    run_state: RunState,
}

impl Edge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The output socket this edge originates from.
    pub fn source(&self) -> SocketId {
        self.source
    }

    /// The input socket this edge terminates at.
    pub fn destination(&self) -> SocketId {
        self.destination
    }

    /// Run state mirrored from the active run cycle, for rendering only.
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub(crate) fn set_run_state(&mut self, state: RunState) {
        self.run_state = state;
    }
}

/// One unit of output streamed back from the kernel for a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputChunk {
    Text(String),
    Binary(Vec<u8>),
}

/// The concrete kinds of executable block the editor instantiates.
///
/// The scheduler never matches on the kind; it only asks for the rendered
/// source via [`Block::source`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Free-form code typed by the user.
    Code { code: String },
    /// A slider bound to a variable; its source assigns the current value.
    Slider {
        variable: String,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A drawing surface bound to a variable; its source assigns the points.
    Drawing {
        variable: String,
        points: Vec<(f64, f64)>,
    },
}

impl BlockKind {
    /// Render this kind into the code string submitted to the kernel.
    pub fn source(&self) -> String {
        match self {
            BlockKind::Code { code } => code.clone(),
            BlockKind::Slider { variable, value, .. } => format!("{variable} = {value}"),
            BlockKind::Drawing { variable, points } => {
                let rendered: Vec<String> = points
                    .iter()
                    .map(|(x, y)| format!("({x}, {y})"))
                    .collect();
                format!("{variable} = [{}]", rendered.join(", "))
            }
        }
    }
}

/// A graph node representing one executable unit of code.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    inputs: Vec<SocketId>,
    outputs: Vec<SocketId>,
    run_state: RunState,
    has_been_run: bool,
    transcript: Vec<OutputChunk>,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Input execution sockets, in creation order.
    pub fn inputs(&self) -> &[SocketId] {
        &self.inputs
    }

    /// Output execution sockets, in creation order.
    pub fn outputs(&self) -> &[SocketId] {
        &self.outputs
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Whether the current run cycle has already executed this block.
    pub fn has_been_run(&self) -> bool {
        self.has_been_run
    }

    /// The code to submit to the kernel for this block.
    pub fn source(&self) -> String {
        self.kind.source()
    }

    /// Output streamed back for the most recent execution.
    pub fn transcript(&self) -> &[OutputChunk] {
        &self.transcript
    }

    pub(crate) fn set_run_state(&mut self, state: RunState) {
        self.run_state = state;
    }

    pub(crate) fn set_has_been_run(&mut self, run: bool) {
        self.has_been_run = run;
    }

    pub(crate) fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    pub(crate) fn push_output(&mut self, chunk: OutputChunk) {
        self.transcript.push(chunk);
    }
}

/// The execution-flow graph: all blocks, sockets and edges of one document.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    blocks: HashMap<BlockId, Block>,
    sockets: HashMap<SocketId, Socket>,
    edges: HashMap<EdgeId, Edge>,
    next_id: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Add a block of the given kind, creating one input and one output
    /// execution socket.
    pub fn add_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.next_id());
        self.blocks.insert(
            id,
            Block {
                id,
                kind,
                inputs: Vec::new(),
                outputs: Vec::new(),
                run_state: RunState::Idle,
                has_been_run: false,
                transcript: Vec::new(),
            },
        );
        self.add_socket(id, SocketKind::Input);
        self.add_socket(id, SocketKind::Output);
        id
    }

    /// Remove a block, cascading to its sockets and their edges.
    pub fn remove_block(&mut self, block: BlockId) {
        let Some(b) = self.blocks.get(&block) else {
            return;
        };
        let sockets: Vec<SocketId> = b.inputs.iter().chain(b.outputs.iter()).copied().collect();
        for socket in sockets {
            self.remove_socket(socket);
        }
        self.blocks.remove(&block);
    }

    /// Add an execution socket of the given kind to a block.
    ///
    /// Panics are avoided by ignoring unknown blocks; the editor only calls
    /// this for blocks it owns.
    pub fn add_socket(&mut self, block: BlockId, kind: SocketKind) -> SocketId {
        let id = SocketId(self.next_id());
        self.sockets.insert(
            id,
            Socket {
                id,
                block,
                kind,
                flow: FlowKind::Exe,
                enabled: true,
                edges: Vec::new(),
            },
        );
        if let Some(b) = self.blocks.get_mut(&block) {
            match kind {
                SocketKind::Input => b.inputs.push(id),
                SocketKind::Output => b.outputs.push(id),
            }
        }
        id
    }

    /// Remove a socket, cascading to every edge attached to it.
    pub fn remove_socket(&mut self, socket: SocketId) {
        let Some(s) = self.sockets.get(&socket) else {
            return;
        };
        let block = s.block;
        for edge in s.edges.clone() {
            self.disconnect(edge);
        }
        if let Some(b) = self.blocks.get_mut(&block) {
            b.inputs.retain(|&id| id != socket);
            b.outputs.retain(|&id| id != socket);
        }
        self.sockets.remove(&socket);
    }

    /// Connect two sockets with a directed edge.
    ///
    /// The arguments may arrive in either order (the editor lets the user
    /// drag from either end); the stored edge always runs output -> input.
    /// Fails when both sockets sit on the same block or share a kind.
    pub fn connect(&mut self, a: SocketId, b: SocketId) -> Result<EdgeId> {
        let sa = self
            .sockets
            .get(&a)
            .ok_or(BlockflowError::UnknownSocket(a))?;
        let sb = self
            .sockets
            .get(&b)
            .ok_or(BlockflowError::UnknownSocket(b))?;

        if sa.block == sb.block {
            return Err(BlockflowError::InvalidConnection(format!(
                "sockets {a:?} and {b:?} belong to the same block {:?}",
                sa.block
            )));
        }
        if sa.kind == sb.kind {
            return Err(BlockflowError::InvalidConnection(format!(
                "sockets {a:?} and {b:?} are both {:?} sockets",
                sa.kind
            )));
        }
        if sa.flow != sb.flow {
            return Err(BlockflowError::InvalidConnection(format!(
                "sockets {a:?} and {b:?} have different flow kinds"
            )));
        }

        let (source, destination) = match sa.kind {
            SocketKind::Output => (a, b),
            SocketKind::Input => (b, a),
        };

        let id = EdgeId(self.next_id());
        self.edges.insert(
            id,
            Edge {
                id,
                source,
                destination,
                run_state: RunState::Idle,
            },
        );
        if let Some(s) = self.sockets.get_mut(&source) {
            s.edges.push(id);
        }
        if let Some(s) = self.sockets.get_mut(&destination) {
            s.edges.push(id);
        }
        Ok(id)
    }

    /// Remove an edge from both endpoint sockets. Idempotent.
    pub fn disconnect(&mut self, edge: EdgeId) {
        let Some(e) = self.edges.remove(&edge) else {
            return;
        };
        if let Some(s) = self.sockets.get_mut(&e.source) {
            s.edges.retain(|&id| id != edge);
        }
        if let Some(s) = self.sockets.get_mut(&e.destination) {
            s.edges.retain(|&id| id != edge);
        }
    }

    /// Enable or disable a socket.
    pub fn set_socket_enabled(&mut self, socket: SocketId, enabled: bool) {
        if let Some(s) = self.sockets.get_mut(&socket) {
            s.enabled = enabled;
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Whether both endpoint sockets of an edge are enabled.
    pub fn edge_enabled(&self, edge: EdgeId) -> bool {
        let Some(e) = self.edges.get(&edge) else {
            return false;
        };
        let src = self.sockets.get(&e.source).is_some_and(|s| s.enabled);
        let dst = self.sockets.get(&e.destination).is_some_and(|s| s.enabled);
        src && dst
    }

    /// Enabled edges terminating at this block's input sockets.
    pub fn enabled_edges_into(&self, block: BlockId) -> Vec<EdgeId> {
        let Some(b) = self.blocks.get(&block) else {
            return Vec::new();
        };
        b.inputs
            .iter()
            .filter_map(|id| self.sockets.get(id))
            .flat_map(|s| s.edges.iter().copied())
            .filter(|&e| self.edge_enabled(e))
            .collect()
    }

    /// Enabled edges originating at this block's output sockets.
    pub fn enabled_edges_out_of(&self, block: BlockId) -> Vec<EdgeId> {
        let Some(b) = self.blocks.get(&block) else {
            return Vec::new();
        };
        b.outputs
            .iter()
            .filter_map(|id| self.sockets.get(id))
            .flat_map(|s| s.edges.iter().copied())
            .filter(|&e| self.edge_enabled(e))
            .collect()
    }

    /// The block owning an edge's source (output) socket.
    pub fn edge_source_block(&self, edge: EdgeId) -> Option<BlockId> {
        let e = self.edges.get(&edge)?;
        self.sockets.get(&e.source).map(|s| s.block)
    }

    /// The block owning an edge's destination (input) socket.
    pub fn edge_destination_block(&self, edge: EdgeId) -> Option<BlockId> {
        let e = self.edges.get(&edge)?;
        self.sockets.get(&e.destination).map(|s| s.block)
    }

    /// Blocks feeding this block through enabled edges on its input sockets.
    pub fn neighbors_via_inputs(&self, block: BlockId) -> Vec<BlockId> {
        self.enabled_edges_into(block)
            .into_iter()
            .filter_map(|e| self.edge_source_block(e))
            .collect()
    }

    /// Blocks fed by this block through enabled edges on its output sockets.
    pub fn neighbors_via_outputs(&self, block: BlockId) -> Vec<BlockId> {
        self.enabled_edges_out_of(block)
            .into_iter()
            .filter_map(|e| self.edge_destination_block(e))
            .collect()
    }

    /// Replace a code block's source text.
    ///
    /// Clears the run-cycle memo; resetting the run states of the block and
    /// its downstream closure is the scheduler's job.
    pub fn set_source(&mut self, block: BlockId, code: String) -> Result<()> {
        let b = self
            .blocks
            .get_mut(&block)
            .ok_or(BlockflowError::UnknownBlock(block))?;
        b.kind = BlockKind::Code { code };
        b.has_been_run = false;
        Ok(())
    }

    /// Move a slider, updating the source its block renders.
    pub fn set_slider_value(&mut self, block: BlockId, value: f64) -> Result<()> {
        let b = self
            .blocks
            .get_mut(&block)
            .ok_or(BlockflowError::UnknownBlock(block))?;
        match &mut b.kind {
            BlockKind::Slider {
                value: current,
                min,
                max,
                ..
            } => {
                *current = value.clamp(*min, *max);
            }
            other => {
                return Err(BlockflowError::KindMismatch(format!(
                    "block {block:?} is not a slider (kind {other:?})"
                )));
            }
        }
        b.has_been_run = false;
        Ok(())
    }

    /// Replace a drawing block's point list.
    pub fn set_drawing_points(&mut self, block: BlockId, points: Vec<(f64, f64)>) -> Result<()> {
        let b = self
            .blocks
            .get_mut(&block)
            .ok_or(BlockflowError::UnknownBlock(block))?;
        match &mut b.kind {
            BlockKind::Drawing { points: current, .. } => {
                *current = points;
            }
            other => {
                return Err(BlockflowError::KindMismatch(format!(
                    "block {block:?} is not a drawing block (kind {other:?})"
                )));
            }
        }
        b.has_been_run = false;
        Ok(())
    }
}

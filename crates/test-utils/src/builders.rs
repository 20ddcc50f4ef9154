#![allow(dead_code)]

use std::collections::HashMap;

use blockflow::graph::{BlockId, BlockKind, Graph};

/// Builder for execution-flow graphs to simplify test setup.
///
/// Blocks are referred to by name; `wire` connects the first output socket
/// of one block to the first input socket of another.
pub struct GraphBuilder {
    graph: Graph,
    names: HashMap<String, BlockId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            names: HashMap::new(),
        }
    }

    /// Add a code block under the given name.
    pub fn code_block(mut self, name: &str, code: &str) -> Self {
        let id = self.graph.add_block(BlockKind::Code {
            code: code.to_string(),
        });
        self.names.insert(name.to_string(), id);
        self
    }

    /// Add a slider block under the given name.
    pub fn slider(mut self, name: &str, variable: &str, value: f64) -> Self {
        let id = self.graph.add_block(BlockKind::Slider {
            variable: variable.to_string(),
            value,
            min: 0.0,
            max: 1.0,
        });
        self.names.insert(name.to_string(), id);
        self
    }

    /// Connect `from`'s first output socket to `to`'s first input socket.
    pub fn wire(mut self, from: &str, to: &str) -> Self {
        let from_id = self.names[from];
        let to_id = self.names[to];
        let out = self.graph.block(from_id).expect("known block").outputs()[0];
        let inp = self.graph.block(to_id).expect("known block").inputs()[0];
        self.graph
            .connect(out, inp)
            .expect("Failed to wire valid blocks in builder");
        self
    }

    pub fn build(self) -> (Graph, HashMap<String, BlockId>) {
        (self.graph, self.names)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::graph::{BlockId, SocketId};

#[derive(Error, Debug)]
pub enum BlockflowError {
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Cycle detected in execution-flow graph involving block {0:?}")]
    CyclicGraph(BlockId),

    #[error("Unknown block: {0:?}")]
    UnknownBlock(BlockId),

    #[error("Unknown socket: {0:?}")]
    UnknownSocket(SocketId),

    #[error("Block kind mismatch: {0}")]
    KindMismatch(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BlockflowError>;

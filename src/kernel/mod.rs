// src/kernel/mod.rs

//! Kernel interface layer.
//!
//! The kernel is the external, stateful, serially-executing backend that
//! actually runs block code. This module is responsible for talking to it
//! and reporting back to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `KernelBackend` trait the runtime uses, and a
//!   concrete `SubprocessKernel` for production; tests replace it with fake
//!   implementations.
//! - [`subprocess`] owns the background loop that drives one child process
//!   per submission, one at a time.

pub mod backend;
pub mod subprocess;

pub use backend::{KernelBackend, SubprocessKernel};
pub use subprocess::{spawn_kernel, KernelRequest};

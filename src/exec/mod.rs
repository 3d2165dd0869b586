// src/exec/mod.rs

//! Step execution layer.
//!
//! This module runs the steps of scheduled tasks and reports back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the loop receiving scheduled tasks.
//! - [`task_runner`] runs the steps of a single task in order.
//! - [`locks`] serializes writes into the same output directory.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` used in production, which tests replace with a
//!   fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod locks;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
pub use locks::OutputLocks;

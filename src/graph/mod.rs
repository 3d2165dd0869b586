// src/graph/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`task_graph`] holds the immutable graph of named tasks.
//! - [`plan`] resolves prerequisites into a memoized execution order.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run.
//! - [`task_info`] provides task metadata and scheduled task types.
//! - [`scheduler_step`] defines the result types of scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod plan;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_graph;
pub mod task_info;

pub use scheduler::Scheduler;
pub use scheduler_step::{RunSummary, SchedulerStep};
pub use task_graph::{TaskGraph, TaskGraphBuilder};
pub use task_info::{ScheduledTask, TaskRunState};

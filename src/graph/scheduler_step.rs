// src/graph/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::engine::TaskName;
use crate::graph::task_info::ScheduledTask;

/// Structured result of a single scheduler "step".
///
/// Tests use it to drive the graph by hand; the core runtime uses it to
/// learn when a run finished and how.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked failed in this step (the failing task and any
    /// blocked dependents).
    pub newly_failed: Vec<TaskName>,
    /// Tasks chained with `chain_mode = "detached"` that should start as a
    /// separate run.
    pub detached_starts: Vec<TaskName>,
    /// Set when this step finished the current run.
    pub finished: Option<RunSummary>,
}

/// Outcome of a finished run, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: u64,
    pub succeeded: Vec<TaskName>,
    /// Tasks whose own action failed.
    pub failed: Vec<TaskName>,
    /// Tasks never started because a prerequisite failed.
    pub blocked: Vec<TaskName>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }

    /// Whether every listed task succeeded in this run.
    pub fn all_succeeded<S: AsRef<str>>(&self, tasks: &[S]) -> bool {
        tasks
            .iter()
            .all(|t| self.succeeded.iter().any(|s| s == t.as_ref()))
    }
}

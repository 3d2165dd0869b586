// src/graph/task_info.rs

//! Task metadata and per-run state.

use std::sync::Arc;

use crate::config::model::{StepConfig, TaskConfig};
use crate::engine::TaskName;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Included in this run, waiting on prerequisites.
    Pending,
    /// Dispatched to the executor.
    Running,
    DoneSuccess,
    /// Failed in this run, or blocked by a failed prerequisite.
    DoneFailed,
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not part of the current run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub steps: Arc<Vec<StepConfig>>,
    /// Direct prerequisites, in declared order.
    pub deps: Vec<TaskName>,
    /// Tasks chained after this one succeeds.
    pub start: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Number of times this task has been dispatched since start-up.
    pub executions: u64,
}

impl TaskInfo {
    pub fn from_config(name: TaskName, cfg: &TaskConfig) -> Self {
        Self {
            name,
            steps: Arc::new(cfg.steps.clone()),
            deps: cfg.after.clone(),
            start: cfg.start.clone(),
            run_state: None,
            executions: 0,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub steps: Arc<Vec<StepConfig>>,
    /// All tasks dispatched for the same run share this id.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            steps: Arc::clone(&info.steps),
            run_id,
        }
    }
}

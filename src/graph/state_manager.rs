// src/graph/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::graph::TaskGraph;
use crate::graph::task_info::{RunState, ScheduledTask, TaskInfo};

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a TaskGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include the tasks of `plan` in this run.
    ///
    /// Tasks not yet part of the run become `Pending` and are appended to
    /// `run_order`. Tasks already in the run keep their state, which is what
    /// makes a shared prerequisite run only once.
    pub fn mark_planned_pending(&mut self, plan: &[TaskName], run_order: &mut Vec<TaskName>) {
        for name in plan {
            match self.tasks.get_mut(name) {
                Some(info) if info.run_state.is_none() => {
                    info.run_state = Some(RunState::Pending);
                    run_order.push(name.clone());
                    debug!(task = %info.name, "marked Pending for this run");
                }
                Some(_) => {}
                None => {
                    warn!(task = %name, "planned task not present in tasks map");
                }
            }
        }
    }

    /// Whether all prerequisites of `info` are done in the current run.
    pub(crate) fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark every pending dependent of a failed task (transitively) as
    /// `DoneFailed` for this run. These tasks are never started.
    ///
    /// Returns the newly blocked tasks, excluding `failed_task` itself.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut visited: HashSet<TaskName> = HashSet::new();
        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(info) = self.tasks.get_mut(&name) {
                if info.run_state == Some(RunState::Pending) {
                    info.run_state = Some(RunState::DoneFailed);
                    debug!(
                        task = %info.name,
                        upstream = %failed_task,
                        "blocking dependent due to upstream failure"
                    );
                    newly_failed.push(info.name.clone());
                    stack.extend(self.graph.dependents_of(&name).iter().cloned());
                }
            }
        }

        newly_failed
    }

    /// Mark every pending task of the run as failed.
    pub fn mark_all_pending_failed(&mut self, run_order: &[TaskName]) -> Vec<TaskName> {
        let mut newly_failed = Vec::new();
        for name in run_order {
            if let Some(info) = self.tasks.get_mut(name) {
                if info.run_state == Some(RunState::Pending) {
                    info.run_state = Some(RunState::DoneFailed);
                    newly_failed.push(name.clone());
                }
            }
        }
        newly_failed
    }

    /// Collect pending tasks whose prerequisites are done, in plan order,
    /// mark them `Running` and return them.
    ///
    /// In sequential mode at most one task is running at any time.
    pub fn collect_new_ready_tasks(
        &mut self,
        run_order: &[TaskName],
        parallel: bool,
    ) -> Vec<ScheduledTask> {
        let any_running = self
            .tasks
            .values()
            .any(|info| info.run_state == Some(RunState::Running));
        if !parallel && any_running {
            return Vec::new();
        }

        let mut candidates: Vec<TaskName> = run_order
            .iter()
            .filter(|name| {
                self.tasks.get(*name).is_some_and(|info| {
                    info.run_state == Some(RunState::Pending) && self.deps_satisfied_for_info(info)
                })
            })
            .cloned()
            .collect();

        if !parallel {
            candidates.truncate(1);
        }

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                info.run_state = Some(RunState::Running);
                info.executions += 1;
                info!(
                    task = %info.name,
                    run_id = self.current_run_id,
                    "prerequisites satisfied; starting task"
                );
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// A read-only view for checking prerequisite satisfaction.
pub(crate) struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub(crate) fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// Prerequisites are satisfied only by a success in the *current* run;
    /// nothing carries over from earlier runs.
    pub(crate) fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => dep.run_state == Some(RunState::DoneSuccess),
            None => {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                false
            }
        })
    }
}

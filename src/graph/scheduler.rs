use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::engine::{TaskName, TaskOutcome};
use crate::graph::scheduler_step::{RunSummary, SchedulerStep};
use crate::graph::state_manager::StateManager;
use crate::graph::task_graph::TaskGraph;
use crate::graph::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::types::ChainMode;

/// Scheduler holds the immutable task graph plus mutable per-run state.
///
/// It is responsible for:
/// - including requested tasks and their prerequisites in the current run
/// - handing out tasks whose prerequisites are done, in plan order
/// - marking tasks as succeeded/failed
/// - blocking dependents when a task fails
/// - chaining `start = [...]` tasks after a success
/// - summarizing the run when every included task is terminal
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    parallel: bool,
    chain_mode: ChainMode,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    /// Tasks of the current run, in the order they were planned.
    run_order: Vec<TaskName>,
    /// Tasks of the current run that were blocked by a failed prerequisite.
    blocked: HashSet<TaskName>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            TaskGraph::from_config(cfg),
            cfg.config.parallel,
            cfg.config.chain_mode,
        )
    }

    pub fn new(graph: TaskGraph, parallel: bool, chain_mode: ChainMode) -> Self {
        let tasks = graph
            .tasks()
            .filter_map(|name| {
                graph
                    .task(name)
                    .map(|def| (name.to_string(), TaskInfo::from_config(name.to_string(), def)))
            })
            .collect();

        Self {
            graph,
            tasks,
            parallel,
            chain_mode,
            run_counter: 0,
            current_run_id: None,
            run_order: Vec::new(),
            blocked: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// How many times `task` has been dispatched since start-up.
    pub fn executions_of(&self, task: &str) -> Option<u64> {
        self.tasks.get(task).map(|info| info.executions)
    }

    /// Start a new run. Every task starts outside the run; nothing carries
    /// over from earlier runs.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.run_order.clear();
        self.blocked.clear();

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Request a task (production API); returns tasks ready to dispatch.
    pub fn handle_request(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.step_request(task).newly_scheduled
    }

    /// Report completion of a task (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.step_completion(task, outcome).newly_scheduled
    }

    /// Include `task` and its transitive prerequisites in the current run.
    pub fn step_request(&mut self, task: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            debug!(task = %task, "request with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        self.include(task);

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks(&self.run_order, self.parallel);
        let finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            finished,
            ..SchedulerStep::default()
        }
    }

    /// Report that a dispatched task finished.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(task = %task, "completion with no active run; ignoring");
                return SchedulerStep::default();
            }
        };

        let mut step = SchedulerStep::default();

        let chained = match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                TaskOutcome::Success => {
                    info.run_state = Some(RunState::DoneSuccess);
                    debug!(task = %info.name, run_id, "task completed successfully");
                    info.start.clone()
                }
                TaskOutcome::Failed(_) | TaskOutcome::Fatal => {
                    info.run_state = Some(RunState::DoneFailed);
                    warn!(
                        task = %info.name,
                        run_id,
                        ?outcome,
                        "task failed; blocking dependents in this run"
                    );
                    step.newly_failed.push(info.name.clone());
                    Vec::new()
                }
            },
            Some(info) => {
                debug!(
                    task = %info.name,
                    run_id,
                    state = ?info.run_state,
                    "completion for a task that is not running; ignoring"
                );
                return step;
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
                return step;
            }
        };

        if !step.newly_failed.is_empty() {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            let blocked = manager.mark_dependents_failed(task);
            self.blocked.extend(blocked.iter().cloned());
            step.newly_failed.extend(blocked);

            if outcome == TaskOutcome::Fatal {
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                let aborted = manager.mark_all_pending_failed(&self.run_order);
                self.blocked.extend(aborted.iter().cloned());
                step.newly_failed.extend(aborted);
            }
        }

        match self.chain_mode {
            ChainMode::Sync => {
                for next in chained.iter() {
                    info!(from = %task, task = %next, run_id, "chaining task into current run");
                    self.include(next);
                }
            }
            ChainMode::Detached => {
                step.detached_starts = chained;
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        step.newly_scheduled = manager.collect_new_ready_tasks(&self.run_order, self.parallel);
        step.finished = self.maybe_finish_run();
        step
    }

    fn include(&mut self, task: &str) {
        let plan = match self.graph.plan(&[task]) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(task = %task, error = %err, "cannot plan requested task; ignoring");
                return;
            }
        };
        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        manager.mark_planned_pending(&plan, &mut self.run_order);
    }

    /// Finish the run if every included task is terminal.
    fn maybe_finish_run(&mut self) -> Option<RunSummary> {
        let run_id = self.current_run_id?;

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        if !manager.all_tasks_terminal() {
            return None;
        }

        let mut summary = RunSummary {
            run_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            blocked: Vec::new(),
        };

        for name in self.run_order.iter() {
            match self.tasks.get(name).and_then(|i| i.run_state) {
                Some(RunState::DoneSuccess) => summary.succeeded.push(name.clone()),
                Some(RunState::DoneFailed) if self.blocked.contains(name) => {
                    summary.blocked.push(name.clone())
                }
                Some(RunState::DoneFailed) => summary.failed.push(name.clone()),
                _ => {}
            }
        }

        info!(
            run_id,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            blocked = summary.blocked.len(),
            "scheduler: all tasks terminal; run finished"
        );
        self.current_run_id = None;
        Some(summary)
    }
}

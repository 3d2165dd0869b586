// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::engine::queue::{QueuedRun, TriggerQueue};
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};
use crate::graph::{RunSummary, ScheduledTask, Scheduler, SchedulerStep, TaskRunState};
use crate::types::ReloadSignal;
use crate::watch::Reaction;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Broadcast a reload to connected browser sessions.
    Reload(ReloadSignal),
    /// A run finished.
    RunFinished(RunRecord),
    /// Request that the process exits (one-shot tasks, once idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Reload waiting for a set of tasks to succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReload {
    pub tasks: Vec<TaskName>,
    pub signal: ReloadSignal,
}

/// A finished run as reported to the shell.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub summary: RunSummary,
    /// Whether this run's outcome counts towards the exit status.
    pub counted: bool,
}

impl RunRecord {
    pub fn is_failure(&self) -> bool {
        self.counted && !self.summary.is_success()
    }
}

/// Bookkeeping for the active run that the scheduler does not own.
#[derive(Debug, Default)]
pub struct ActiveRun {
    pub reloads: Vec<PendingReload>,
    pub counted: bool,
}

/// Mutable core state shared by all handlers.
pub struct CoreState<'a> {
    pub scheduler: &'a mut Scheduler,
    pub queue: &'a mut TriggerQueue,
    pub active: &'a mut Option<ActiveRun>,
    pub options: &'a RuntimeOptions,
}

/// Handle a run request from the CLI or a detached chain.
pub fn handle_run_request(
    state: &mut CoreState<'_>,
    tasks: Vec<TaskName>,
    reason: TriggerReason,
) -> CoreStep {
    debug!(?tasks, ?reason, "run requested");
    let run = QueuedRun::new(tasks, reason != TriggerReason::Chained);
    let commands = request_run(state, run);
    finish_step(state, commands)
}

/// Handle a watch reaction.
///
/// Reload-only reactions are broadcast immediately. Reactions with tasks
/// request a run; their reload (if any) fires only once every task of the
/// reaction has succeeded in that run.
pub fn handle_watch_reaction(state: &mut CoreState<'_>, reaction: Reaction) -> CoreStep {
    let signal = reaction.reload_signal();

    if reaction.tasks.is_empty() {
        let commands = signal.map(CoreCommand::Reload).into_iter().collect();
        return CoreStep::running(commands);
    }

    let reloads = signal
        .map(|signal| PendingReload {
            tasks: reaction.tasks.clone(),
            signal,
        })
        .into_iter()
        .collect();

    let mut run = QueuedRun::new(reaction.tasks, true);
    run.reloads = reloads;
    let commands = request_run(state, run);
    finish_step(state, commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    state: &mut CoreState<'_>,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = state.scheduler.step_completion(&task, outcome);

    if outcome == TaskOutcome::Fatal && state.options.exit_when_idle {
        warn!(task = %task, "fatal error; dropping queued runs");
        state.queue.clear();
    }

    let commands = apply_scheduler_step(state, step);
    finish_step(state, commands)
}

/// Start `run` now if idle; otherwise merge its unseen tasks into the active
/// run and queue the rest for a later run.
fn request_run(state: &mut CoreState<'_>, run: QueuedRun) -> Vec<CoreCommand> {
    if state.scheduler.is_idle() {
        let mut run = run;
        if let Some(queued) = state.queue.drain_pending() {
            run.merge(queued);
        }
        return start_new_run(state, run);
    }

    let mut to_queue: Vec<TaskName> = Vec::new();
    let mut commands = Vec::new();

    for task in run.tasks.iter() {
        match state.scheduler.run_state_of(task) {
            None => {
                warn!(task = %task, "run requested for unknown task; ignoring");
            }
            Some(TaskRunState::NotInRun) => {
                let step = state.scheduler.step_request(task);
                commands.extend(apply_scheduler_step(state, step));
            }
            Some(_already_in_run) => {
                to_queue.push(task.clone());
            }
        }
    }

    if to_queue.is_empty() {
        if let Some(active) = state.active.as_mut() {
            active.reloads.extend(run.reloads);
            active.counted |= run.counted;
        }
    } else {
        // The tasks that joined the active run are settled before the queued
        // run starts; its reloads wait on the queued tasks only.
        let reloads = run
            .reloads
            .into_iter()
            .map(|mut pending| {
                pending.tasks.retain(|t| to_queue.contains(t));
                pending
            })
            .collect();
        state.queue.record(QueuedRun {
            tasks: to_queue,
            reloads,
            counted: run.counted,
        });
    }

    commands
}

/// Seed a new run from a batch of requested tasks.
pub fn start_new_run(state: &mut CoreState<'_>, run: QueuedRun) -> Vec<CoreCommand> {
    if run.tasks.is_empty() {
        return Vec::new();
    }

    state.scheduler.start_new_run();
    *state.active = Some(ActiveRun {
        reloads: run.reloads,
        counted: run.counted,
    });

    let mut commands = Vec::new();
    for task in run.tasks.iter() {
        let step = state.scheduler.step_request(task);
        commands.extend(apply_scheduler_step(state, step));
    }
    commands
}

/// Turn a scheduler step into commands, closing the run if it finished.
fn apply_scheduler_step(state: &mut CoreState<'_>, step: SchedulerStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if !step.detached_starts.is_empty() {
        info!(tasks = ?step.detached_starts, "queuing detached chained run");
        state.queue.record(QueuedRun::new(step.detached_starts, false));
    }

    if let Some(summary) = step.finished {
        let active = state.active.take().unwrap_or_default();

        for pending in active.reloads {
            if summary.all_succeeded(&pending.tasks) {
                commands.push(CoreCommand::Reload(pending.signal));
            } else {
                info!(
                    tasks = ?pending.tasks,
                    run_id = summary.run_id,
                    "skipping reload; a triggering task did not succeed"
                );
            }
        }

        commands.push(CoreCommand::RunFinished(RunRecord {
            summary,
            counted: active.counted,
        }));

        if let Some(queued) = state.queue.drain_pending() {
            commands.extend(start_new_run(state, queued));
        }
    }

    commands
}

/// Append `RequestExit` when a one-shot runtime has nothing left to do.
fn finish_step(state: &mut CoreState<'_>, mut commands: Vec<CoreCommand>) -> CoreStep {
    let mut keep_running = true;
    if state.options.exit_when_idle && state.scheduler.is_idle() && state.queue.is_empty() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }
    CoreStep {
        commands,
        keep_running,
    }
}

// src/exec/task_runner.rs

//! Runs the steps of a single task.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::locks::OutputLocks;
use crate::graph::ScheduledTask;
use crate::steps::{StepContext, run_step};

/// Run every step of `task` and emit exactly one `TaskCompleted` event.
pub async fn run_task(
    task: ScheduledTask,
    ctx: &StepContext,
    locks: &OutputLocks,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let outcome = execute_steps(&task, ctx, locks).await;

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        warn!(task = %task.name, "runtime gone; dropping completion");
    }
}

/// Run the steps in order, stopping at the first failing one.
///
/// Failures of informational steps are logged and skipped. Filesystem
/// errors yield [`TaskOutcome::Fatal`].
pub async fn execute_steps(
    task: &ScheduledTask,
    ctx: &StepContext,
    locks: &OutputLocks,
) -> TaskOutcome {
    info!(
        task = %task.name,
        run_id = task.run_id,
        steps = task.steps.len(),
        "starting task"
    );

    for (index, step) in task.steps.iter().enumerate() {
        let _guards = locks.acquire(&step.output_dirs()).await;

        match run_step(ctx, step).await {
            Ok(()) => {}
            Err(err) if step.is_informational() => {
                warn!(
                    task = %task.name,
                    step = step.label(),
                    index,
                    error = %err,
                    "informational step failed; continuing"
                );
            }
            Err(err) => {
                error!(
                    task = %task.name,
                    run_id = task.run_id,
                    step = step.label(),
                    index,
                    error = %err,
                    "step failed"
                );
                return if err.is_fatal() {
                    TaskOutcome::Fatal
                } else {
                    TaskOutcome::Failed(err.exit_code())
                };
            }
        }
    }

    info!(task = %task.name, run_id = task.run_id, "task finished");
    TaskOutcome::Success
}

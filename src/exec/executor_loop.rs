// src/exec/executor_loop.rs

//! Main executor loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::exec::locks::OutputLocks;
use crate::exec::task_runner::run_task;
use crate::graph::ScheduledTask;
use crate::steps::StepContext;

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` forwards scheduled
/// tasks to. Each task runs in its own Tokio task; the scheduler never
/// dispatches a task twice within a run, so no per-name bookkeeping is
/// needed here.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    ctx: StepContext,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);
    let locks = Arc::new(OutputLocks::new());

    tokio::spawn(async move {
        info!(root = %ctx.root.display(), "executor loop started");

        while let Some(task) = rx.recv().await {
            let rt_tx = runtime_tx.clone();
            let ctx = ctx.clone();
            let locks = Arc::clone(&locks);
            let name = task.name.clone();

            tokio::spawn(async move {
                run_task(task, &ctx, &locks, rt_tx).await;
                debug!(task = %name, "task runner future finished");
            });
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

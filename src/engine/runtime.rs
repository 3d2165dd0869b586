// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::graph::ScheduledTask;
use crate::server::ReloadChannel;
use crate::types::ReloadSignal;

use super::core::CoreRuntime;
use super::{CoreCommand, RunRecord, RuntimeEvent};

/// Every run the runtime saw finish, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeReport {
    pub runs: Vec<RunRecord>,
}

impl RuntimeReport {
    /// `true` unless a run whose outcome counts had a failed or blocked task.
    pub fn is_success(&self) -> bool {
        !self.runs.iter().any(RunRecord::is_failure)
    }
}

/// Drives the scheduler in response to `RuntimeEvent`s and delegates step
/// execution to an `ExecutorBackend`.
///
/// This is the IO shell around `CoreRuntime`, which owns all the runtime
/// semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    reload: Option<ReloadChannel>,
    run_tx: Option<mpsc::UnboundedSender<RunRecord>>,
    report: RuntimeReport,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reload: None,
            run_tx: None,
            report: RuntimeReport::default(),
        }
    }

    /// Broadcast reload commands on `channel`.
    pub fn with_reload_channel(mut self, channel: ReloadChannel) -> Self {
        self.reload = Some(channel);
        self
    }

    /// Forward each finished run to `tx` as well as the final report.
    pub fn with_run_listener(mut self, tx: mpsc::UnboundedSender<RunRecord>) -> Self {
        self.run_tx = Some(tx);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core.
    pub async fn run(mut self) -> Result<RuntimeReport> {
        info!("assetpipe runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!(runs = self.report.runs.len(), "runtime exiting");
        Ok(self.report)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::Reload(signal) => self.broadcast(signal),
            CoreCommand::RunFinished(record) => {
                if let Some(tx) = &self.run_tx {
                    if tx.send(record.clone()).is_err() {
                        debug!("run listener dropped; not forwarding run summary");
                    }
                }
                self.report.runs.push(record);
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn broadcast(&self, signal: ReloadSignal) {
        match &self.reload {
            Some(channel) => {
                channel.reload(signal);
            }
            None => warn!(?signal, "reload requested but no dev server is running"),
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        let run_ids: Vec<_> = tasks.iter().map(|t| t.run_id).collect();
        debug!(?names, ?run_ids, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

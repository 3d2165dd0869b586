// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, sending `ScheduledTask`s to the executor and
//! broadcasting reloads. The core itself never touches Tokio, the
//! filesystem, or processes.

use crate::engine::event_handlers::{
    ActiveRun, CoreState, CoreStep, handle_run_request, handle_task_completion,
    handle_watch_reaction,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::graph::Scheduler;
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    active: Option<ActiveRun>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour, queue_length),
            active: None,
            options,
        }
    }

    /// Whether no run is active.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let mut state = CoreState {
            scheduler: &mut self.scheduler,
            queue: &mut self.queue,
            active: &mut self.active,
            options: &self.options,
        };

        match event {
            RuntimeEvent::RunRequested { tasks, reason } => {
                handle_run_request(&mut state, tasks, reason)
            }
            RuntimeEvent::WatchReaction(reaction) => handle_watch_reaction(&mut state, reaction),
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut state, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

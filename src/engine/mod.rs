// src/engine/mod.rs

//! Orchestration engine for assetpipe.
//!
//! This module ties together:
//! - the task scheduler
//! - the trigger queue (what happens when watch reactions arrive while a run
//!   is active)
//! - the main runtime event loop that reacts to:
//!   - run requests from the CLI
//!   - watch reactions
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::watch::Reaction;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// A step failed; carries the tool exit code, or -1 for built-in steps.
    Failed(i32),
    /// A filesystem error; aborts one-shot invocations.
    Fatal,
}

/// Why a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Task named on the command line.
    Manual,
    /// Watch rule reaction.
    FileWatch,
    /// `start = [...]` with `chain_mode = "detached"`.
    Chained,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit the runtime once idle with nothing queued (one-shot tasks).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the CLI, watcher and executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Run these tasks (and their prerequisites).
    RunRequested {
        tasks: Vec<TaskName>,
        reason: TriggerReason,
    },
    /// A watch rule fired for a batch of changes.
    WatchReaction(Reaction),
    /// A dispatched task finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep, PendingReload, RunRecord};
pub use queue::{QueuedRun, TriggerQueue};
pub use crate::types::{ChainMode, TriggerWhileRunningBehaviour};
pub use runtime::{Runtime, RuntimeReport};

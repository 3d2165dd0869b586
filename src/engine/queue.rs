// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::TaskName;
use super::event_handlers::PendingReload;
use crate::types::TriggerWhileRunningBehaviour;

/// A run waiting for the current one to finish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuedRun {
    /// Requested tasks in first-seen order, without duplicates.
    pub tasks: Vec<TaskName>,
    /// Reloads to emit if the listed tasks succeed in that run.
    pub reloads: Vec<PendingReload>,
    /// Whether the run's outcome counts towards the exit status.
    pub counted: bool,
}

impl QueuedRun {
    pub fn new(tasks: impl IntoIterator<Item = TaskName>, counted: bool) -> Self {
        let mut run = Self {
            counted,
            ..Self::default()
        };
        run.extend_tasks(tasks);
        run
    }

    /// Append tasks not requested yet, keeping request order.
    pub fn extend_tasks(&mut self, tasks: impl IntoIterator<Item = TaskName>) {
        for task in tasks {
            if !self.tasks.contains(&task) {
                self.tasks.push(task);
            }
        }
    }

    pub fn merge(&mut self, other: QueuedRun) {
        self.extend_tasks(other.tasks);
        self.reloads.extend(other.reloads);
        self.counted |= other.counted;
    }
}

/// Queue of runs requested while another run is executing.
///
/// Semantics:
/// - Each queued entry is a *batch* of task names to run together later.
/// - `queue_length` (max_runs) bounds how many batches are kept.
/// - When the runtime is idle and wants to start a new run, it calls
///   [`TriggerQueue::drain_pending`], which merges all queued batches into a
///   single run.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<QueuedRun>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn behaviour(&self) -> TriggerWhileRunningBehaviour {
        self.behaviour
    }

    /// Record a run requested while another is in progress.
    ///
    /// - `Queue`: merge into the last batch if there is one, otherwise start
    ///   a new batch; drop the oldest batches beyond `max_runs`.
    /// - `Cancel`: drop all existing batches and keep only this one.
    pub fn record(&mut self, run: QueuedRun) {
        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                if let Some(last) = self.runs.back_mut() {
                    debug!(tasks = ?run.tasks, "merged trigger into last queued batch (queue mode)");
                    last.merge(run);
                } else {
                    debug!(tasks = ?run.tasks, "created first queued batch (queue mode)");
                    self.runs.push_back(run);
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded max_runs; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(tasks = ?run.tasks, "resetting queued batches to this trigger only (cancel mode)");
                self.runs.clear();
                self.runs.push_back(run);
            }
        }
    }

    /// Drain every queued batch into a single run, or `None` when empty.
    pub fn drain_pending(&mut self) -> Option<QueuedRun> {
        let mut merged: Option<QueuedRun> = None;

        while let Some(batch) = self.runs.pop_front() {
            match merged.as_mut() {
                Some(m) => m.merge(batch),
                None => merged = Some(batch),
            }
        }

        if let Some(run) = &merged {
            debug!(drained = run.tasks.len(), "drained queued triggers into new run");
        }
        merged
    }

    /// Forget everything queued.
    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

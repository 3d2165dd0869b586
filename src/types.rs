// src/types.rs

use serde::{Deserialize, Serialize};

/// Behaviour when a watch reaction arrives while a run is already in progress.
///
/// - `Queue`: remember the reaction and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued run and only keep the latest
///   reaction. The active run itself is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

/// How tasks listed in `start = [...]` are chained after the task that names
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainMode {
    /// Chained tasks join the current run once the chaining task succeeds.
    /// Their failures count towards the exit status.
    #[default]
    Sync,
    /// Chained tasks start as a separate run after the current one finishes.
    /// Their outcome is logged only.
    Detached,
}

/// What a connected browser session should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadScope {
    /// Full page navigation.
    #[default]
    Full,
    /// Re-fetch stylesheets in place, no navigation.
    Styles,
}

/// Broadcast to connected browser sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSignal {
    pub scope: ReloadScope,
    /// Paths (relative to the project root) that caused the reload.
    pub paths: Vec<String>,
}

impl ReloadSignal {
    pub fn full() -> Self {
        Self {
            scope: ReloadScope::Full,
            paths: Vec::new(),
        }
    }

    pub fn new(scope: ReloadScope, paths: Vec<String>) -> Self {
        Self { scope, paths }
    }
}

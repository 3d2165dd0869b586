// src/watch/dispatch.rs

//! Turning a batch of changed paths into reactions.

use tracing::debug;

use crate::engine::TaskName;
use crate::types::{ReloadScope, ReloadSignal};
use crate::watch::patterns::WatchRule;

/// One debounced batch of changes: unique root-relative paths in arrival
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchEvent {
    pub paths: Vec<String>,
}

impl WatchEvent {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut event = Self::default();
        for path in paths {
            event.push(path.into());
        }
        event
    }

    /// Add `path` unless it is already part of the batch.
    pub fn push(&mut self, path: String) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// What a watch rule asks for after a batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub rule: usize,
    /// Tasks to re-run.
    pub tasks: Vec<TaskName>,
    pub reload: Option<ReloadScope>,
    /// Paths of the batch that matched the rule.
    pub paths: Vec<String>,
}

impl Reaction {
    pub fn reload_signal(&self) -> Option<ReloadSignal> {
        self.reload
            .map(|scope| ReloadSignal::new(scope, self.paths.clone()))
    }
}

/// Every rule matching at least one path of `event` yields exactly one
/// reaction, in rule order.
pub fn dispatch(rules: &[WatchRule], event: &WatchEvent) -> Vec<Reaction> {
    rules
        .iter()
        .filter_map(|rule| {
            let paths: Vec<String> = event
                .paths
                .iter()
                .filter(|p| rule.matches(p))
                .cloned()
                .collect();
            if paths.is_empty() {
                return None;
            }
            debug!(rule = rule.index(), ?paths, "watch rule matched");
            Some(Reaction {
                rule: rule.index(),
                tasks: rule.tasks().to_vec(),
                reload: rule.reload(),
                paths,
            })
        })
        .collect()
}

// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::{TaskConfig, WatchRuleConfig};
use crate::engine::TaskName;
use crate::steps::sources::compile_globset;
use crate::types::ReloadScope;

/// A compiled `[[task.<name>.watch]]` rule.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"app/styles/main.scss"`) into [`WatchRule::matches`].
#[derive(Clone)]
pub struct WatchRule {
    /// Position in the config, used in logs.
    index: usize,
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
    tasks: Vec<TaskName>,
    reload: Option<ReloadScope>,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("index", &self.index)
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    pub fn compile(index: usize, cfg: &WatchRuleConfig) -> Result<Self> {
        let include = compile_globset(&cfg.patterns)
            .with_context(|| format!("building watch globset for rule {index}"))?;
        let exclude = if cfg.exclude.is_empty() {
            None
        } else {
            Some(
                compile_globset(&cfg.exclude)
                    .with_context(|| format!("building exclude globset for rule {index}"))?,
            )
        };

        Ok(Self {
            index,
            patterns: cfg.patterns.clone(),
            include,
            exclude,
            tasks: cfg.tasks.clone(),
            reload: cfg.reload,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn reload(&self) -> Option<ReloadScope> {
        self.reload
    }

    /// Returns true if the rule is interested in `rel_path`.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Compile the watch rules of a long-running task, in declared order.
pub fn compile_rules(task: &TaskConfig) -> Result<Vec<WatchRule>> {
    task.watch
        .iter()
        .enumerate()
        .map(|(index, cfg)| WatchRule::compile(index, cfg))
        .collect()
}

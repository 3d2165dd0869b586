// src/graph/task_graph.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::engine::TaskName;
use crate::errors::{PipelineError, Result};
use crate::graph::plan::{check_chains, resolve_plan};

/// Internal node structure: the task definition plus adjacency.
#[derive(Debug, Clone)]
struct TaskNode {
    def: Arc<TaskConfig>,
    /// Direct dependents: tasks that list this one in their `after`.
    dependents: Vec<TaskName>,
}

/// Immutable task graph, built once at start-up and handed to the
/// orchestrator.
///
/// Prerequisites keep their declared order; the scheduler relies on it to
/// produce a reproducible execution order.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, TaskNode>,
}

impl TaskGraph {
    /// Build a graph from a validated [`ConfigFile`].
    ///
    /// Validation already rejected unknown references and cycles.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_task_map(&cfg.task)
    }

    pub(crate) fn from_task_map(tasks: &BTreeMap<TaskName, TaskConfig>) -> Self {
        let defs = tasks
            .iter()
            .map(|(name, task)| (name.clone(), Arc::new(task.clone())))
            .collect();
        Self::from_defs(defs)
    }

    fn from_defs(defs: BTreeMap<TaskName, Arc<TaskConfig>>) -> Self {
        let mut nodes: BTreeMap<TaskName, TaskNode> = defs
            .into_iter()
            .map(|(name, def)| {
                (
                    name,
                    TaskNode {
                        def,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| {
                node.def
                    .after
                    .iter()
                    .map(move |dep| (dep.clone(), name.clone()))
            })
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Definition of a task.
    pub fn task(&self, name: &str) -> Option<&Arc<TaskConfig>> {
        self.nodes.get(name).map(|n| &n.def)
    }

    /// Like [`TaskGraph::task`], but with a `TaskNotFound` error.
    pub fn require(&self, name: &str) -> Result<&Arc<TaskConfig>> {
        self.task(name)
            .ok_or_else(|| PipelineError::TaskNotFound(name.to_string()))
    }

    /// Immediate prerequisites of a task, in declared order.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.def.after.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks chained through `start`, in declared order.
    pub fn starts_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.def.start.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Execution order for `targets`: prerequisites first, each task once.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<TaskName>> {
        resolve_plan(self, targets)
    }
}

/// Incremental construction of a [`TaskGraph`] for programmatic use.
///
/// Duplicate names fail at `register`; unknown prerequisites and cycles fail
/// at `build`, before anything can run.
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    defs: BTreeMap<TaskName, Arc<TaskConfig>>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with its ordered prerequisites and action.
    pub fn register(&mut self, name: impl Into<TaskName>, def: TaskConfig) -> Result<&mut Self> {
        let name = name.into();
        if self.defs.contains_key(&name) {
            return Err(PipelineError::ConfigError(format!(
                "task '{}' is registered twice",
                name
            )));
        }
        debug!(task = %name, after = ?def.after, "registering task");
        self.defs.insert(name, Arc::new(def));
        Ok(self)
    }

    /// Validate the whole graph and freeze it.
    pub fn build(self) -> Result<TaskGraph> {
        for (name, def) in self.defs.iter() {
            for dep in def.after.iter().chain(def.start.iter()) {
                if !self.defs.contains_key(dep) {
                    return Err(PipelineError::ConfigError(format!(
                        "task '{}' references unknown task '{}'",
                        name, dep
                    )));
                }
            }
        }

        let graph = TaskGraph::from_defs(self.defs);

        // Resolving every task once surfaces any cycle with its full path.
        let all: Vec<TaskName> = graph.tasks().map(str::to_string).collect();
        graph.plan(&all)?;
        check_chains(&graph)?;

        Ok(graph)
    }
}

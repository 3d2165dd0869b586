// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile, StepConfig};
use crate::errors::{PipelineError, Result};
use crate::graph::TaskGraph;
use crate::graph::plan::check_chains;
use crate::steps::sources::compile_glob;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

/// Run every semantic check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_references(cfg)?;
    validate_graph(cfg)?;
    validate_patterns(cfg)?;
    validate_servers(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipelineError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(PipelineError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(PipelineError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(PipelineError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }

        for chained in task.start.iter() {
            if !cfg.task.contains_key(chained) {
                return Err(PipelineError::ConfigError(format!(
                    "task '{}' starts unknown task '{}'",
                    name, chained
                )));
            }
        }

        if task.server.is_none() && !task.watch.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "task '{}' declares watch rules but no [server]",
                name
            )));
        }

        for rule in task.watch.iter() {
            if rule.tasks.is_empty() && rule.reload.is_none() {
                return Err(PipelineError::ConfigError(format!(
                    "watch rule in task '{}' has neither `tasks` nor `reload`",
                    name
                )));
            }
            for target in rule.tasks.iter() {
                if !cfg.task.contains_key(target) {
                    return Err(PipelineError::ConfigError(format!(
                        "watch rule in task '{}' references unknown task '{}'",
                        name, target
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: prerequisite -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(PipelineError::GraphCycle(format!(
            "`after` chain through task '{}'",
            cycle.node_id()
        )));
    }

    check_chains(&TaskGraph::from_task_map(&cfg.task))
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let step_patterns = task.steps.iter().flat_map(|s| s.source_patterns());
        let watch_patterns = task
            .watch
            .iter()
            .flat_map(|r| r.patterns.iter().chain(r.exclude.iter()).map(String::as_str));

        for pat in step_patterns.chain(watch_patterns) {
            compile_glob(pat).map_err(|e| {
                PipelineError::ConfigError(format!(
                    "task '{}' has invalid glob pattern '{}': {}",
                    name, pat, e
                ))
            })?;
        }

        for step in task.steps.iter() {
            if let StepConfig::Inject(inject) = step {
                for target in inject.targets.iter() {
                    if let Some(re) = &target.ignore_path {
                        Regex::new(re).map_err(|e| {
                            PipelineError::ConfigError(format!(
                                "task '{}' has invalid ignore_path '{}': {}",
                                name, re, e
                            ))
                        })?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_servers(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let Some(server) = &task.server else { continue };
        if server.base_dirs.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "server of task '{}' needs at least one base dir",
                name
            )));
        }
        for prefix in server.routes.keys() {
            if !prefix.starts_with('/') || prefix == "/" || prefix.starts_with("/__assetpipe") {
                return Err(PipelineError::ConfigError(format!(
                    "server of task '{}' has invalid route prefix '{}'",
                    name, prefix
                )));
            }
        }
    }
    Ok(())
}

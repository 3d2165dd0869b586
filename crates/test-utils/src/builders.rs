#![allow(dead_code)]

use std::collections::BTreeMap;

use assetpipe::config::{
    CommandStep, ConfigFile, ConfigSection, RawConfigFile, ServerConfig, StepConfig, TaskConfig,
    WatchRuleConfig,
};
use assetpipe::errors::Result;
use assetpipe::types::{ChainMode, ReloadScope, TriggerWhileRunningBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn parallel(mut self, val: bool) -> Self {
        self.config.config.parallel = val;
        self
    }

    pub fn chain_mode(mut self, mode: ChainMode) -> Self {
        self.config.config.chain_mode = mode;
        self
    }

    pub fn behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn queue_length(mut self, len: usize) -> Self {
        self.config.config.queue_length = len;
        self
    }

    /// Validate without panicking, for tests that expect a config error.
    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
#[derive(Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn start(mut self, next: &str) -> Self {
        self.task.start.push(next.to_string());
        self
    }

    pub fn step(mut self, step: StepConfig) -> Self {
        self.task.steps.push(step);
        self
    }

    /// Append a command step without sources.
    pub fn command(self, cmd: &str) -> Self {
        self.step(StepConfig::Command(CommandStep {
            cmd: cmd.to_string(),
            src: Vec::new(),
            exclude: Vec::new(),
            dest: None,
            ext: None,
            base: None,
            per_file: true,
            informational: false,
        }))
    }

    pub fn server(mut self, base_dirs: &[&str], port: u16) -> Self {
        self.task.server = Some(ServerConfig {
            base_dirs: base_dirs.iter().map(|d| d.to_string()).collect(),
            port,
            routes: BTreeMap::new(),
        });
        self
    }

    pub fn route(mut self, prefix: &str, dir: &str) -> Self {
        if let Some(server) = self.task.server.as_mut() {
            server.routes.insert(prefix.to_string(), dir.to_string());
        }
        self
    }

    pub fn watch(mut self, patterns: &[&str], tasks: &[&str], reload: Option<ReloadScope>) -> Self {
        self.task.watch.push(WatchRuleConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            exclude: Vec::new(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            reload,
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

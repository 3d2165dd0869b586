use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{ChainMode, ReloadScope, TriggerWhileRunningBehaviour};

/// Top-level pipeline configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// triggered_while_running_behaviour = "queue"
/// chain_mode = "sync"
///
/// [task.styles]
/// after = ["images"]
///
/// [[task.styles.steps]]
/// kind = "command"
/// src = ["app/styles/*.scss"]
/// dest = ".tmp/styles"
/// ext = "css"
/// cmd = "sass {input} {output}"
/// ```
///
/// This is the raw, unvalidated form. Use [`ConfigFile`] (obtained through
/// `TryFrom` or `load_and_validate`) everywhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated pipeline configuration.
///
/// Only constructed through validation, so holders can rely on: at least one
/// task, known prerequisite names, no cycles, compilable patterns.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"queue"` (default) or `"cancel"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued runs to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// `"sync"` (default) or `"detached"`; see [`ChainMode`].
    #[serde(default)]
    pub chain_mode: ChainMode,

    /// Window used to coalesce bursts of filesystem events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Hand out every ready task at once instead of one at a time.
    #[serde(default)]
    pub parallel: bool,
}

fn default_queue_length() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            chain_mode: ChainMode::default(),
            debounce_ms: default_debounce_ms(),
            parallel: false,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Prerequisites, run before this task in the listed order.
    #[serde(default)]
    pub after: Vec<String>,

    /// Tasks chained after this one succeeds (see `chain_mode`).
    #[serde(default)]
    pub start: Vec<String>,

    /// Transform steps, executed in order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Dev server started once the task's own run has finished.
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Watch rules active while the dev server runs.
    #[serde(default)]
    pub watch: Vec<WatchRuleConfig>,
}

impl TaskConfig {
    /// Whether running this task keeps the process alive (dev server).
    pub fn is_long_running(&self) -> bool {
        self.server.is_some()
    }
}

/// One transform step. The `kind` key selects the variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    Command(CommandStep),
    Lint(LintStep),
    Copy(CopyStep),
    Clean(CleanStep),
    Inject(InjectStep),
    Bundle(BundleStep),
    InlineImages(InlineImagesStep),
    SizeReport(SizeReportStep),
}

impl StepConfig {
    /// Short label used in logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            StepConfig::Command(_) => "command",
            StepConfig::Lint(_) => "lint",
            StepConfig::Copy(_) => "copy",
            StepConfig::Clean(_) => "clean",
            StepConfig::Inject(_) => "inject",
            StepConfig::Bundle(_) => "bundle",
            StepConfig::InlineImages(_) => "inline_images",
            StepConfig::SizeReport(_) => "size_report",
        }
    }

    /// Informational steps log their failures instead of failing the task.
    pub fn is_informational(&self) -> bool {
        match self {
            StepConfig::Command(c) => c.informational,
            StepConfig::SizeReport(_) => true,
            _ => false,
        }
    }

    /// Directories this step writes into. Writes into the same directory
    /// are serialized by the executor.
    pub fn output_dirs(&self) -> Vec<String> {
        match self {
            StepConfig::Command(c) => match &c.dest {
                Some(dest) => vec![dest.clone()],
                // In place: the tool rewrites its inputs.
                None => c
                    .src
                    .iter()
                    .map(|s| parent_dir_of_glob(s).unwrap_or_else(|| ".".to_string()))
                    .collect(),
            },
            StepConfig::Lint(_) | StepConfig::SizeReport(_) => Vec::new(),
            StepConfig::Copy(c) => c.dest.clone(),
            StepConfig::Clean(c) => c.paths.clone(),
            StepConfig::Inject(c) => c
                .targets
                .iter()
                .filter_map(|t| parent_dir_of_glob(&t.src))
                .collect(),
            StepConfig::Bundle(c) => vec![c.dest.clone()],
            StepConfig::InlineImages(c) => c.src.iter().filter_map(|s| parent_dir_of_glob(s)).collect(),
        }
    }

    /// Glob patterns this step reads, used for validation.
    pub fn source_patterns(&self) -> Vec<&str> {
        match self {
            StepConfig::Command(c) => c.src.iter().chain(c.exclude.iter()).map(String::as_str).collect(),
            StepConfig::Lint(c) => c.src.iter().chain(c.exclude.iter()).map(String::as_str).collect(),
            StepConfig::Copy(c) => c.src.iter().chain(c.exclude.iter()).map(String::as_str).collect(),
            StepConfig::Inject(c) => c.targets.iter().map(|t| t.src.as_str()).collect(),
            StepConfig::Bundle(c) => c.src.iter().map(String::as_str).collect(),
            StepConfig::InlineImages(c) => c.src.iter().map(String::as_str).collect(),
            StepConfig::Clean(_) | StepConfig::SizeReport(_) => Vec::new(),
        }
    }
}

/// Leading literal directory of a glob (`app/styles/*.scss` -> `app/styles`).
pub(crate) fn parent_dir_of_glob(pattern: &str) -> Option<String> {
    let literal: Vec<&str> = pattern
        .split('/')
        .take_while(|seg| !seg.contains(['*', '?', '[', '{']))
        .collect();
    // The last literal segment is a file name when the glob has no wildcard.
    let dirs = if literal.len() == pattern.split('/').count() {
        &literal[..literal.len().saturating_sub(1)]
    } else {
        &literal[..]
    };
    if dirs.is_empty() {
        None
    } else {
        Some(dirs.join("/"))
    }
}

/// Run an external tool over matched files.
///
/// With `per_file = true` (default) the command runs once per matched file
/// with `{input}` and `{output}` substituted; otherwise it runs once with
/// `{inputs}` (space separated). `{dest}` is always available.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandStep {
    pub cmd: String,
    #[serde(default)]
    pub src: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub dest: Option<String>,
    /// Replacement extension for `{output}` (e.g. `"css"` for sass).
    #[serde(default)]
    pub ext: Option<String>,
    /// Glob base for computing output paths; defaults to the literal prefix
    /// of each source pattern.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default = "default_true")]
    pub per_file: bool,
    #[serde(default)]
    pub informational: bool,
}

/// Run an external linter and report one diagnostic per violation.
///
/// The linter is expected to print violations as `file:line:col: message`
/// (the "unix" formatter of most linters). Other lines are passed through.
#[derive(Debug, Clone, Deserialize)]
pub struct LintStep {
    pub cmd: String,
    pub src: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopyStep {
    #[serde(default)]
    pub src: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// One or more destination directories; every file goes to each.
    pub dest: Vec<String>,
    #[serde(default)]
    pub base: Option<String>,
    /// Match dotfiles with `*` patterns.
    #[serde(default)]
    pub dot: bool,
    /// Also copy main files of manifest packages matching this glob
    /// (e.g. `"**/*.{eot,svg,ttf,woff,woff2}"`). Copied flat into `dest`.
    #[serde(default)]
    pub manifest_main: Option<String>,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_components_dir")]
    pub components_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanStep {
    pub paths: Vec<String>,
}

/// Rewrite `bower:<ext>` marker blocks to reference manifest packages.
#[derive(Debug, Clone, Deserialize)]
pub struct InjectStep {
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_components_dir")]
    pub components_dir: String,
    pub targets: Vec<InjectTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InjectTarget {
    pub src: String,
    /// Regex stripped from the start of every injected path.
    #[serde(default)]
    pub ignore_path: Option<String>,
}

/// Concatenate `build:<type>` blocks of HTML files into bundles.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleStep {
    pub src: Vec<String>,
    pub dest: String,
    /// Directories searched, in order, for referenced assets.
    #[serde(default)]
    pub search_path: Vec<String>,
    /// Append a content hash to bundle names and rewrite references.
    #[serde(default)]
    pub rev: bool,
}

/// Inline small images referenced by stylesheets as data URIs.
#[derive(Debug, Clone, Deserialize)]
pub struct InlineImagesStep {
    pub src: Vec<String>,
    pub base_dir: String,
    #[serde(default = "default_max_image_size")]
    pub max_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizeReportStep {
    pub dir: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Also report the total of each file gzipped.
    #[serde(default)]
    pub gzip: bool,
}

/// `[task.<name>.server]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Directories served at `/`, first match wins.
    pub base_dirs: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra prefix routes mapped to directories.
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

/// `[[task.<name>.watch]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchRuleConfig {
    pub patterns: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub reload: Option<ReloadScope>,
}

fn default_true() -> bool {
    true
}

fn default_manifest() -> String {
    "bower.json".to_string()
}

fn default_components_dir() -> String {
    "bower_components".to_string()
}

fn default_max_image_size() -> u64 {
    100 * 1024
}

fn default_port() -> u16 {
    9000
}

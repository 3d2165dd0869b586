// src/steps/mod.rs

//! Built-in transform steps.
//!
//! Each step is a stateless operation over files below the project root.
//! External tools are run through [`shell`]; everything else goes through the
//! [`FileSystem`] abstraction so it can be tested against a mock.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::model::StepConfig;
use crate::errors::{PipelineError, Result};
use crate::fs::{FileSystem, RealFileSystem};

pub mod bundle;
pub mod clean;
pub mod command;
pub mod copy;
pub mod inject;
pub mod inline_images;
pub mod lint;
pub mod manifest;
pub mod shell;
pub mod size_report;
pub mod sources;

/// Everything a step needs besides its own configuration.
#[derive(Clone)]
pub struct StepContext {
    /// Project root; all configured paths are relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    /// Set while a dev server is running. Lint violations are then reported
    /// without failing the task.
    pub server_active: bool,
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("root", &self.root)
            .field("server_active", &self.server_active)
            .finish_non_exhaustive()
    }
}

impl StepContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fs: Arc::new(RealFileSystem),
            server_active: false,
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_server_active(mut self, active: bool) -> Self {
        self.server_active = active;
        self
    }

    /// Absolute path for a root-relative path.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub(crate) fn read(&self, rel: &str) -> Result<Vec<u8>> {
        let path = self.path(rel);
        self.fs
            .read(&path)
            .map_err(|e| PipelineError::filesystem(path, e))
    }

    pub(crate) fn read_to_string(&self, rel: &str) -> Result<String> {
        let path = self.path(rel);
        self.fs
            .read_to_string(&path)
            .map_err(|e| PipelineError::filesystem(path, e))
    }

    pub(crate) fn write(&self, rel: &str, contents: &[u8]) -> Result<()> {
        let path = self.path(rel);
        debug!(path = %rel, bytes = contents.len(), "writing file");
        self.fs
            .write(&path, contents)
            .map_err(|e| PipelineError::filesystem(path, e))
    }

    pub(crate) fn is_file(&self, rel: &str) -> bool {
        self.fs.is_file(&self.path(rel))
    }
}

/// Run one step to completion.
///
/// Steps backed by external tools run as child processes; the built-in ones
/// run on the blocking pool.
pub async fn run_step(ctx: &StepContext, step: &StepConfig) -> Result<()> {
    match step {
        StepConfig::Command(cfg) => command::run(ctx, cfg).await,
        StepConfig::Lint(cfg) => lint::run(ctx, cfg).await.map(|_| ()),
        builtin => {
            let ctx = ctx.clone();
            let step = builtin.clone();
            tokio::task::spawn_blocking(move || run_builtin(&ctx, &step))
                .await
                .map_err(|e| PipelineError::Other(e.into()))?
        }
    }
}

fn run_builtin(ctx: &StepContext, step: &StepConfig) -> Result<()> {
    match step {
        StepConfig::Copy(cfg) => copy::run(ctx, cfg).map(|_| ()),
        StepConfig::Clean(cfg) => clean::run(ctx, cfg),
        StepConfig::Inject(cfg) => inject::run(ctx, cfg).map(|_| ()),
        StepConfig::Bundle(cfg) => bundle::run(ctx, cfg).map(|_| ()),
        StepConfig::InlineImages(cfg) => inline_images::run(ctx, cfg).map(|_| ()),
        StepConfig::SizeReport(cfg) => size_report::run(ctx, cfg).map(|report| {
            println!("{report}");
        }),
        StepConfig::Command(_) | StepConfig::Lint(_) => Err(PipelineError::transform(
            step.label(),
            "external tool step dispatched to the built-in runner",
        )),
    }
}

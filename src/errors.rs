// src/errors.rs

//! Crate-wide error type and aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    /// A single asset step failed, with source location when known.
    #[error("{step} failed{}: {message}", location(.file, .line))]
    Transform {
        step: String,
        file: Option<PathBuf>,
        line: Option<u32>,
        message: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{step} failed: `{command}` exited with status {code}")]
    ToolFailed {
        step: String,
        command: String,
        code: i32,
    },

    #[error("lint reported {violations} violation(s)")]
    Lint { violations: usize },

    /// Permission or missing-path failures. Fatal for one-shot invocations.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn transform(step: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Transform {
            step: step.into(),
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Exit status reported to the scheduler for a failed step.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ToolFailed { code, .. } => *code,
            _ => -1,
        }
    }

    /// Whether this error must abort a one-shot invocation as a whole rather
    /// than only the owning task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Filesystem { .. })
    }
}

fn location(file: &Option<PathBuf>, line: &Option<u32>) -> String {
    match (file, line) {
        (Some(f), Some(l)) => format!(" at {}:{}", f.display(), l),
        (Some(f), None) => format!(" at {}", f.display()),
        _ => String::new(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;

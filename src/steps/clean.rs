// src/steps/clean.rs

use std::io::ErrorKind;

use tracing::{debug, info};

use crate::config::model::CleanStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;

/// Delete the configured paths. Missing paths are fine; anything else
/// (permissions, busy files) is a filesystem error.
pub fn run(ctx: &StepContext, cfg: &CleanStep) -> Result<()> {
    for rel in cfg.paths.iter() {
        let path = ctx.path(rel);
        match ctx.fs.remove_all(&path) {
            Ok(()) => info!(path = %rel, "removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %rel, "nothing to clean");
            }
            Err(e) => return Err(PipelineError::filesystem(path, e)),
        }
    }
    Ok(())
}

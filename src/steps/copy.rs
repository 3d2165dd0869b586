// src/steps/copy.rs

//! `copy` step.

use tracing::info;

use crate::config::model::CopyStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;
use crate::steps::manifest;
use crate::steps::sources::{self, compile_glob};

/// Copy matched files into every destination. Returns the written paths.
///
/// Project files keep their path below the base; manifest main files
/// selected by `manifest_main` are copied flat.
pub fn run(ctx: &StepContext, cfg: &CopyStep) -> Result<Vec<String>> {
    let mut plan: Vec<(String, String)> = Vec::new();

    if let Some(filter) = &cfg.manifest_main {
        let matcher = compile_glob(filter).map_err(|e| {
            PipelineError::ConfigError(format!("invalid manifest_main glob {filter:?}: {e}"))
        })?;
        if ctx.is_file(&cfg.manifest) {
            for file in manifest::main_files(ctx, &cfg.manifest, &cfg.components_dir)? {
                if matcher.is_match(&file) {
                    let name = file.rsplit('/').next().unwrap_or(&file).to_string();
                    plan.push((file, name));
                }
            }
        } else {
            info!(manifest = %cfg.manifest, "no manifest; copying project files only");
        }
    }

    let files = sources::resolve(
        ctx.fs.as_ref(),
        &ctx.root,
        &cfg.src,
        &cfg.exclude,
        cfg.base.as_deref(),
        cfg.dot,
    )?;
    plan.extend(
        files
            .iter()
            .map(|f| (f.rel.clone(), f.rel_to_base().to_string())),
    );

    let mut written = Vec::new();
    for (from, to) in plan.iter() {
        let contents = ctx.read(from)?;
        for dest in cfg.dest.iter() {
            let target = sources::join(dest, to);
            ctx.write(&target, &contents)?;
            written.push(target);
        }
    }

    info!(files = plan.len(), dest = ?cfg.dest, "copied files");
    Ok(written)
}

// src/steps/command.rs

//! `command` step: run an external tool over matched files.

use tracing::{debug, info};

use crate::config::model::CommandStep;
use crate::errors::{PipelineError, Result};
use crate::steps::shell::{quote, render, run_checked};
use crate::steps::sources::{self, SourceFile};
use crate::steps::StepContext;

/// Root-relative output path for `source`: its path below the base, moved
/// into `dest` and given the new extension. Without `dest` the tool writes
/// in place.
pub fn output_path(cfg: &CommandStep, source: &SourceFile) -> String {
    let moved = match &cfg.dest {
        Some(dest) => sources::join(dest, source.rel_to_base()),
        None => source.rel.clone(),
    };
    match &cfg.ext {
        Some(ext) => sources::with_extension(&moved, ext),
        None => moved,
    }
}

/// Build every command line this step would run, in order.
pub fn plan_commands(ctx: &StepContext, cfg: &CommandStep) -> Result<Vec<String>> {
    let dest = quote(cfg.dest.as_deref().unwrap_or("."));

    if cfg.src.is_empty() {
        return Ok(vec![render(&cfg.cmd, &[("dest", &dest)])]);
    }

    let files = sources::resolve(
        ctx.fs.as_ref(),
        &ctx.root,
        &cfg.src,
        &cfg.exclude,
        cfg.base.as_deref(),
        false,
    )?;

    if files.is_empty() {
        return Ok(Vec::new());
    }

    if !cfg.per_file {
        let inputs = files
            .iter()
            .map(|f| quote(&f.rel))
            .collect::<Vec<_>>()
            .join(" ");
        return Ok(vec![render(&cfg.cmd, &[("inputs", &inputs), ("dest", &dest)])]);
    }

    Ok(files
        .iter()
        .map(|file| {
            let input = quote(&file.rel);
            let output = quote(&output_path(cfg, file));
            render(
                &cfg.cmd,
                &[("input", &input), ("output", &output), ("dest", &dest)],
            )
        })
        .collect())
}

pub async fn run(ctx: &StepContext, cfg: &CommandStep) -> Result<()> {
    let commands = plan_commands(ctx, cfg)?;
    if commands.is_empty() {
        info!(src = ?cfg.src, "no files matched; nothing to do");
        return Ok(());
    }

    if let Some(dest) = &cfg.dest {
        let dir = ctx.path(dest);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::filesystem(&dir, e))?;
    }
    if cfg.per_file && cfg.dest.is_some() {
        create_output_parents(ctx, cfg).await?;
    }

    for cmd in commands.iter() {
        let output = run_checked(&ctx.root, "command", cmd).await?;
        for line in output.stdout.lines() {
            debug!(%cmd, "stdout: {}", line);
        }
    }
    Ok(())
}

/// Nested sources (`app/images/icons/a.svg`) need their subdirectory in
/// `dest` before the tool can write there.
async fn create_output_parents(ctx: &StepContext, cfg: &CommandStep) -> Result<()> {
    let files = sources::resolve(
        ctx.fs.as_ref(),
        &ctx.root,
        &cfg.src,
        &cfg.exclude,
        cfg.base.as_deref(),
        false,
    )?;
    for file in files.iter() {
        let out = output_path(cfg, file);
        let dir = ctx.path(sources::parent(&out));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::filesystem(&dir, e))?;
    }
    Ok(())
}

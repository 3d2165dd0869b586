// src/steps/inject.rs

//! `inject` step: keep `bower:<ext>` marker blocks in sync with the manifest.
//!
//! ```html
//! <!-- bower:js -->
//! <script src="/bower_components/jquery/dist/jquery.js"></script>
//! <!-- endbower -->
//! ```
//!
//! Stylesheets use line comments (`// bower:scss` … `// endbower`).

use regex::Regex;
use tracing::{debug, info};

use crate::config::model::{InjectStep, InjectTarget};
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;
use crate::steps::manifest;
use crate::steps::sources;

/// Rewrite every target file. Returns the files that changed.
pub fn run(ctx: &StepContext, cfg: &InjectStep) -> Result<Vec<String>> {
    let mains = manifest::main_files(ctx, &cfg.manifest, &cfg.components_dir)?;
    let mut changed = Vec::new();

    for target in cfg.targets.iter() {
        let ignore = compile_ignore(target)?;
        let files = sources::resolve(
            ctx.fs.as_ref(),
            &ctx.root,
            std::slice::from_ref(&target.src),
            &[],
            None,
            false,
        )?;

        for file in files.iter() {
            let original = ctx.read_to_string(&file.rel)?;
            let rewritten = rewrite(&file.rel, &original, &mains, ignore.as_ref())?;
            if rewritten != original {
                ctx.write(&file.rel, rewritten.as_bytes())?;
                changed.push(file.rel.clone());
            } else {
                debug!(file = %file.rel, "dependency blocks already up to date");
            }
        }
    }

    info!(files = changed.len(), "injected dependencies");
    Ok(changed)
}

fn compile_ignore(target: &InjectTarget) -> Result<Option<Regex>> {
    target
        .ignore_path
        .as_deref()
        .map(|re| {
            Regex::new(re).map_err(|e| {
                PipelineError::ConfigError(format!("invalid ignore_path regex {re:?}: {e}"))
            })
        })
        .transpose()
}

enum Marker<'a> {
    Start(&'a str),
    End,
}

fn marker(line: &str) -> Option<Marker<'_>> {
    let trimmed = line.trim();
    let body = trimmed
        .strip_prefix("<!--")
        .and_then(|s| s.strip_suffix("-->"))
        .or_else(|| trimmed.strip_prefix("//"))?
        .trim();

    if body == "endbower" {
        return Some(Marker::End);
    }
    body.strip_prefix("bower:")
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(Marker::Start)
}

/// Replace the content of every marker block in `text` (the contents of the
/// root-relative `file`) with references to the matching `mains`.
pub fn rewrite(file: &str, text: &str, mains: &[String], ignore: Option<&Regex>) -> Result<String> {
    let host_ext = file.rsplit('.').next().unwrap_or_default();
    let host_dir = sources::parent(file);
    let mut out = Vec::new();
    let mut open: Option<(usize, &str)> = None;

    for (idx, line) in text.lines().enumerate() {
        match (open, marker(line)) {
            (None, Some(Marker::Start(ext))) => {
                out.push(line.to_string());
                let indent = &line[..line.len() - line.trim_start().len()];
                for main in mains.iter().filter(|m| m.ends_with(&format!(".{ext}"))) {
                    let mut path = sources::relative_path(host_dir, main);
                    if let Some(re) = ignore {
                        path = re.replace(&path, "").into_owned();
                    }
                    out.push(format!("{indent}{}", reference(host_ext, ext, &path)));
                }
                open = Some((idx, ext));
            }
            (Some(_), Some(Marker::End)) => {
                out.push(line.to_string());
                open = None;
            }
            (Some(_), _) => {}
            (None, _) => out.push(line.to_string()),
        }
    }

    if let Some((idx, ext)) = open {
        return Err(PipelineError::Transform {
            step: "inject".to_string(),
            file: Some(file.into()),
            line: Some(idx as u32 + 1),
            message: format!("`bower:{ext}` block is never closed with `endbower`"),
        });
    }

    let mut result = out.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

fn reference(host_ext: &str, ext: &str, path: &str) -> String {
    match (host_ext, ext) {
        ("html" | "htm", "css") => format!(r#"<link rel="stylesheet" href="{path}" />"#),
        ("html" | "htm", "js") => format!(r#"<script src="{path}"></script>"#),
        ("scss" | "sass" | "less", _) => format!(r#"@import "{path}";"#),
        _ => path.to_string(),
    }
}

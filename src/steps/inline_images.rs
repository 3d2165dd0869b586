// src/steps/inline_images.rs

//! `inline_images` step: small images referenced from stylesheets become
//! base64 data URIs.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::config::model::InlineImagesStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;
use crate::steps::sources;

static URL_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#));

/// MIME type for the image extensions we inline.
pub fn mime_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Rewrite every matched stylesheet in place. Returns how many references
/// were inlined.
pub fn run(ctx: &StepContext, cfg: &InlineImagesStep) -> Result<usize> {
    let re = URL_RE
        .as_ref()
        .map_err(|e| PipelineError::transform("inline_images", e.to_string()))?;
    let sheets = sources::resolve(ctx.fs.as_ref(), &ctx.root, &cfg.src, &[], None, false)?;
    let mut inlined = 0;

    for sheet in sheets.iter() {
        let css = ctx.read_to_string(&sheet.rel)?;
        let mut count = 0;
        let rewritten = re.replace_all(&css, |caps: &Captures<'_>| {
            let url = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match data_uri(ctx, cfg, url) {
                Some(uri) => {
                    count += 1;
                    format!("url({uri})")
                }
                None => caps[0].to_string(),
            }
        });

        if count > 0 {
            ctx.write(&sheet.rel, rewritten.as_bytes())?;
            debug!(sheet = %sheet.rel, count, "inlined images");
        }
        inlined += count;
    }

    info!(inlined, "inlined stylesheet images");
    Ok(inlined)
}

/// Data URI for `url`, or `None` to leave the reference as is (remote,
/// already inline, unknown type, missing, or too large).
fn data_uri(ctx: &StepContext, cfg: &InlineImagesStep, url: &str) -> Option<String> {
    if url.is_empty()
        || url.starts_with("data:")
        || url.starts_with("//")
        || url.contains("://")
    {
        return None;
    }
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    let mime = mime_for(clean)?;

    let direct = sources::normalize(&sources::join(&cfg.base_dir, clean.trim_start_matches('/')));
    let by_name = sources::join(&cfg.base_dir, clean.rsplit('/').next().unwrap_or(clean));
    let path = [direct, by_name].into_iter().find(|p| ctx.is_file(p))?;

    let size = ctx.fs.file_size(&ctx.path(&path)).ok()?;
    if size > cfg.max_size {
        debug!(image = %path, size, max = cfg.max_size, "image too large to inline");
        return None;
    }
    let bytes = ctx.read(&path).ok()?;
    Some(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

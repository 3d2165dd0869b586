// src/steps/bundle.rs

//! `bundle` step: concatenate `build:<type>` blocks of HTML pages.
//!
//! ```html
//! <!-- build:css(.tmp) styles/main.css -->
//! <link rel="stylesheet" href="styles/main.css">
//! <!-- endbuild -->
//! ```
//!
//! Every asset referenced inside a block is looked up along the search path
//! (or the directories in parentheses), concatenated into `<dest>/<target>`
//! and the block is replaced by a single reference. With `rev` the bundle
//! name gets a content hash.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::model::BundleStep;
use crate::errors::{PipelineError, Result};
use crate::steps::StepContext;
use crate::steps::sources;

static BUILD_START_RE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^\s*<!--\s*build:(?P<kind>\w+)(?:\((?P<paths>[^)]*)\))?\s+(?P<target>\S+)\s*-->\s*$")
});
static BUILD_END_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\s*<!--\s*endbuild\s*-->\s*$"));
static ASSET_REF_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(?:href|src)\s*=\s*["']([^"']+)["']"#));

fn regex(re: &'static LazyLock<std::result::Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    re.as_ref()
        .map_err(|e| PipelineError::transform("bundle", e.to_string()))
}

/// What one bundle step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    /// Rewritten pages, root-relative.
    pub pages: Vec<String>,
    /// Bundle target (as written in the page) → written path.
    pub bundles: BTreeMap<String, String>,
}

struct Block {
    kind: String,
    search: Vec<String>,
    target: String,
    refs: Vec<String>,
    line: u32,
}

pub fn run(ctx: &StepContext, cfg: &BundleStep) -> Result<BundleOutput> {
    let pages = sources::resolve(ctx.fs.as_ref(), &ctx.root, &cfg.src, &[], None, false)?;
    let mut output = BundleOutput::default();

    for page in pages.iter() {
        let html = ctx.read_to_string(&page.rel)?;
        let (segments, blocks) = parse_page(&page.rel, &html)?;

        let mut replacements = Vec::with_capacity(blocks.len());
        for block in blocks.iter() {
            let written = write_bundle(ctx, cfg, &page.rel, block)?;
            let reference = sources::relative_path(&cfg.dest, &written);
            output.bundles.insert(block.target.clone(), written);
            replacements.push(tag(&block.kind, &reference));
        }

        let rendered = render_page(&segments, &replacements, html.ends_with('\n'));
        let out_path = sources::join(&cfg.dest, page.rel_to_base());
        ctx.write(&out_path, rendered.as_bytes())?;
        debug!(page = %page.rel, out = %out_path, blocks = blocks.len(), "bundled page");
        output.pages.push(out_path);
    }

    info!(
        pages = output.pages.len(),
        bundles = output.bundles.len(),
        "bundled html pages"
    );
    Ok(output)
}

/// Page lines with `None` where a block's replacement goes.
type Segments = Vec<Option<String>>;

fn parse_page(file: &str, html: &str) -> Result<(Segments, Vec<Block>)> {
    let start_re = regex(&BUILD_START_RE)?;
    let end_re = regex(&BUILD_END_RE)?;
    let ref_re = regex(&ASSET_REF_RE)?;

    let mut segments = Vec::new();
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, line) in html.lines().enumerate() {
        if let Some(block) = current.as_mut() {
            if end_re.is_match(line) {
                blocks.extend(current.take());
                segments.push(None);
            } else {
                block
                    .refs
                    .extend(ref_re.captures_iter(line).map(|c| c[1].to_string()));
            }
            continue;
        }

        match start_re.captures(line) {
            Some(caps) => {
                current = Some(Block {
                    kind: caps["kind"].to_string(),
                    search: caps
                        .name("paths")
                        .map(|p| {
                            p.as_str()
                                .split(',')
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect()
                        })
                        .unwrap_or_default(),
                    target: caps["target"].to_string(),
                    refs: Vec::new(),
                    line: idx as u32 + 1,
                });
            }
            None => segments.push(Some(line.to_string())),
        }
    }

    if let Some(block) = current {
        return Err(PipelineError::Transform {
            step: "bundle".to_string(),
            file: Some(file.into()),
            line: Some(block.line),
            message: format!("`build:{}` block is never closed with `endbuild`", block.kind),
        });
    }

    Ok((segments, blocks))
}

fn render_page(segments: &Segments, replacements: &[String], trailing_newline: bool) -> String {
    let mut replacements = replacements.iter();
    let lines: Vec<&str> = segments
        .iter()
        .filter_map(|seg| match seg {
            Some(line) => Some(line.as_str()),
            None => replacements.next().map(String::as_str),
        })
        .collect();
    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

/// Concatenate a block's assets, write the bundle and return its path.
fn write_bundle(ctx: &StepContext, cfg: &BundleStep, page: &str, block: &Block) -> Result<String> {
    let search: Vec<String> = if block.search.is_empty() {
        let mut dirs = cfg.search_path.clone();
        dirs.push(sources::parent(page).to_string());
        dirs
    } else {
        block.search.clone()
    };

    let mut contents: Vec<u8> = Vec::new();
    for reference in block.refs.iter() {
        let asset = locate(ctx, &search, reference).ok_or_else(|| PipelineError::Transform {
            step: "bundle".to_string(),
            file: Some(page.into()),
            line: Some(block.line),
            message: format!("asset `{reference}` not found in search path {search:?}"),
        })?;
        if !contents.is_empty() {
            contents.extend_from_slice(if block.kind == "js" { b";\n" } else { b"\n" });
        }
        contents.extend(ctx.read(&asset)?);
    }

    let target = sources::normalize(block.target.trim_start_matches('/'));
    let name = if cfg.rev {
        revisioned(&target, &contents)
    } else {
        target
    };
    let path = sources::join(&cfg.dest, &name);
    ctx.write(&path, &contents)?;
    Ok(path)
}

fn locate(ctx: &StepContext, search: &[String], reference: &str) -> Option<String> {
    let clean = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
        .trim_start_matches('/');
    search
        .iter()
        .map(|dir| sources::normalize(&sources::join(dir, clean)))
        .find(|candidate| ctx.is_file(candidate))
}

/// `styles/main.css` → `styles/main-<10 hex digits of the content hash>.css`.
pub fn revisioned(target: &str, contents: &[u8]) -> String {
    let hash = blake3::hash(contents).to_hex();
    let digest = &hash.as_str()[..10];
    let (dir, name) = match target.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, target),
    };
    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{digest}.{ext}"),
        _ => format!("{name}-{digest}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{renamed}"),
        None => renamed,
    }
}

fn tag(kind: &str, reference: &str) -> String {
    match kind {
        "css" => format!(r#"<link rel="stylesheet" href="{reference}">"#),
        "js" => format!(r#"<script src="{reference}"></script>"#),
        _ => reference.to_string(),
    }
}

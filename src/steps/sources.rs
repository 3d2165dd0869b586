// src/steps/sources.rs

//! Resolving glob patterns to source files below the project root.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::config::model::parent_dir_of_glob;
use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;

/// A matched source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root, `/`-separated.
    pub rel: String,
    /// Literal directory prefix of the pattern that matched (`app/styles`
    /// for `app/styles/*.scss`), or the configured base.
    pub base: String,
}

impl SourceFile {
    /// Path below [`SourceFile::base`].
    pub fn rel_to_base(&self) -> &str {
        strip_dir(&self.rel, &self.base)
    }
}

/// Compile one pattern the way every step and watch rule does: `*` never
/// crosses a `/`.
pub fn compile_glob(pattern: &str) -> std::result::Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

pub fn compile_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()?,
        );
    }
    builder.build()
}

fn config_err(pattern: &str, err: globset::Error) -> PipelineError {
    PipelineError::ConfigError(format!("invalid glob pattern {pattern:?}: {err}"))
}

/// Resolve `include` minus `exclude` to files.
///
/// Files are returned in pattern order, sorted within a pattern, each at most
/// once. Unless `dot` is set, files with a dot-prefixed path component below
/// the pattern base are skipped. A pattern whose base directory does not
/// exist matches nothing.
pub fn resolve(
    fs: &dyn FileSystem,
    root: &Path,
    include: &[String],
    exclude: &[String],
    base: Option<&str>,
    dot: bool,
) -> Result<Vec<SourceFile>> {
    let exclude_set = compile_globset(exclude).map_err(|e| config_err(&exclude.join(", "), e))?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in include {
        let matcher = compile_glob(pattern).map_err(|e| config_err(pattern, e))?;
        let pattern_base = parent_dir_of_glob(pattern).unwrap_or_default();
        let walk_root = if pattern_base.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&pattern_base)
        };

        let candidates = if fs.is_file(&walk_root) {
            vec![walk_root]
        } else if fs.is_dir(&walk_root) {
            if pattern_base.is_empty() {
                // Root-level patterns never descend further than the glob asks.
                list_for_pattern(fs, &walk_root, pattern)?
            } else {
                fs.walk_files(&walk_root)
                    .map_err(|e| PipelineError::filesystem(&walk_root, e))?
            }
        } else {
            Vec::new()
        };

        let effective_base = base.map(str::to_string).unwrap_or_else(|| pattern_base.clone());

        for path in candidates {
            let Some(rel) = relative(root, &path) else {
                continue;
            };
            if !matcher.is_match(&rel) || exclude_set.is_match(&rel) {
                continue;
            }
            if !dot && has_hidden_component(strip_dir(&rel, &pattern_base)) {
                continue;
            }
            if seen.insert(rel.clone()) {
                out.push(SourceFile {
                    rel,
                    base: effective_base.clone(),
                });
            }
        }
    }

    Ok(out)
}

/// Files directly in the root, or everything when the pattern recurses.
fn list_for_pattern(fs: &dyn FileSystem, dir: &Path, pattern: &str) -> Result<Vec<std::path::PathBuf>> {
    let result: io::Result<Vec<_>> = if pattern.contains("**") || pattern.contains('/') {
        fs.walk_files(dir)
    } else {
        fs.read_dir(dir)
            .map(|entries| entries.into_iter().filter(|p| fs.is_file(p)).collect())
    };
    result.map_err(|e| PipelineError::filesystem(dir, e))
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

fn has_hidden_component(rel: &str) -> bool {
    rel.split('/').any(|seg| seg.starts_with('.') && seg != "." && seg != "..")
}

/// `rel` with the leading `dir/` removed, if present.
pub fn strip_dir<'a>(rel: &'a str, dir: &str) -> &'a str {
    if dir.is_empty() {
        return rel;
    }
    rel.strip_prefix(dir)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(rel)
}

/// Join `/`-separated path segments, skipping empty ones.
pub fn join(dir: &str, rel: &str) -> String {
    match (dir.trim_end_matches('/'), rel.trim_start_matches('/')) {
        ("", r) => r.to_string(),
        (d, "") => d.to_string(),
        (d, r) => format!("{d}/{r}"),
    }
}

/// Lexically resolve `.` and `..` segments. Leading `..` that would escape
/// the root are kept.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Relative path from directory `from_dir` to `to`, both root-relative.
pub fn relative_path(from_dir: &str, to: &str) -> String {
    let from = normalize(from_dir);
    let to = normalize(to);
    let from: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = std::iter::repeat_n("..", from.len() - common).collect();
    parts.extend(&to[common..]);
    parts.join("/")
}

/// Parent directory of a root-relative path (`""` at the root).
pub fn parent(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Replace the extension of the last path segment.
pub fn with_extension(rel: &str, ext: &str) -> String {
    let (dir, name) = match rel.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, rel),
    };
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let renamed = format!("{stem}.{}", ext.trim_start_matches('.'));
    match dir {
        Some(dir) => format!("{dir}/{renamed}"),
        None => renamed,
    }
}

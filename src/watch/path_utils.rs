// src/watch/path_utils.rs

use std::path::{Path, PathBuf};

/// `path` relative to `root` with forward slashes, or `None` when the path
/// lies outside the root.
///
/// `root` is expected to be canonical. Event paths may not be (symlinked
/// temp dirs on macOS), and removed files cannot be canonicalized at all, so
/// the fallback canonicalizes the parent directory and re-attaches the file
/// name.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return non_empty(to_slash(rel));
    }

    let canonical = canonical_or_parent(path)?;
    let rel = canonical.strip_prefix(root).ok()?;
    non_empty(to_slash(rel))
}

fn canonical_or_parent(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = path.canonicalize() {
        return Some(p);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

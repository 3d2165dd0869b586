// src/steps/manifest.rs

//! Reading the bower dependency manifest.
//!
//! The project manifest (`bower.json`) lists packages under `dependencies`.
//! Each installed package lives in `<components_dir>/<name>/` and declares
//! its entry files under `main` (a string or a list) in its own
//! `bower.json`, `.bower.json` or `package.json`. The project manifest may
//! override a package's files with `overrides.<name>.main`.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::steps::StepContext;
use crate::steps::sources;

const PACKAGE_MANIFESTS: [&str; 3] = ["bower.json", ".bower.json", "package.json"];

/// Main files of every declared package in declaration order, root-relative,
/// dependencies of a package listed before the package itself.
pub fn main_files(ctx: &StepContext, manifest: &str, components_dir: &str) -> Result<Vec<String>> {
    let root_manifest: Value = serde_json::from_str(&ctx.read_to_string(manifest)?)?;
    let overrides = root_manifest.get("overrides").cloned().unwrap_or(Value::Null);

    let mut visited = HashSet::new();
    let mut files = Vec::new();
    for name in dependency_names(&root_manifest) {
        visit(ctx, components_dir, &overrides, &name, &mut visited, &mut files)?;
    }
    debug!(count = files.len(), "resolved manifest main files");
    Ok(files)
}

fn visit(
    ctx: &StepContext,
    components_dir: &str,
    overrides: &Value,
    name: &str,
    visited: &mut HashSet<String>,
    files: &mut Vec<String>,
) -> Result<()> {
    if !visited.insert(name.to_string()) {
        return Ok(());
    }

    let pkg_dir = sources::join(components_dir, name);
    let Some(pkg) = read_package_manifest(ctx, &pkg_dir)? else {
        warn!(package = %name, dir = %pkg_dir, "package not installed; skipping");
        return Ok(());
    };

    for dep in dependency_names(&pkg) {
        visit(ctx, components_dir, overrides, &dep, visited, files)?;
    }

    let main = overrides
        .get(name)
        .and_then(|o| o.get("main"))
        .or_else(|| pkg.get("main"));

    for entry in string_or_list(main) {
        let path = sources::normalize(&sources::join(&pkg_dir, &entry));
        if ctx.is_file(&path) {
            if !files.contains(&path) {
                files.push(path);
            }
        } else {
            warn!(package = %name, file = %path, "main file missing; skipping");
        }
    }
    Ok(())
}

fn read_package_manifest(ctx: &StepContext, pkg_dir: &str) -> Result<Option<Value>> {
    for file in PACKAGE_MANIFESTS {
        let path = sources::join(pkg_dir, file);
        if ctx.is_file(&path) {
            let value = serde_json::from_str(&ctx.read_to_string(&path)?)?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn dependency_names(manifest: &Value) -> Vec<String> {
    manifest
        .get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

fn string_or_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

//! Source file discovery for batch runs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Extensions the transform can parse
const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"];

/// Directory names never descended into below a root
const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", "build", "out", "coverage", "target"];

fn is_supported_source_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    // Declaration files have no function bodies to rewrite
    let is_declaration = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(".d"));

    SOURCE_EXTENSIONS.contains(&ext) && !(is_declaration && ext.ends_with("ts"))
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_none_or(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
}

/// Collect all supported source files under `root`, sorted
///
/// A root that is a file is taken when its extension is supported. A root
/// directory is always walked, whatever its name; below it, skipped and
/// hidden directories are pruned and symlinks are never followed.
pub fn collect_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(if is_supported_source_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).with_context(|| format!("failed to read directory: {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read directory: {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to read file type: {}", path.display()))?;

            if file_type.is_dir() {
                if !is_skipped_dir(&path) {
                    pending.push(path);
                }
            } else if file_type.is_file() && is_supported_source_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

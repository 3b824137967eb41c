//! Repository tree walk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use lg_path::rel_posix;

use crate::gitignore::GitignoreMatcher;

/// File names admitted even without a matching extension.
const SPECIAL_NAMES: &[&str] = &["README", "Dockerfile", "Makefile", "pyproject.toml"];

/// Walks the repository, yielding candidate files in sorted order.
///
/// Filters applied here: `.git` is never entered, `.gitignore` rules prune
/// both directories and files, `dir_pruner` prunes directories early
/// (receives the repo-relative POSIX path), and files must carry one of
/// `extensions` (lowercase, with dot) or be a special name.
pub fn walk_files(
    root: &Path,
    extensions: &BTreeSet<String>,
    gitignore: &GitignoreMatcher,
    mut dir_pruner: impl FnMut(&str) -> bool,
) -> Vec<PathBuf> {
    let mut out = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let Some(rel) = rel_posix(entry.path(), root) else {
                return false;
            };
            if rel.is_empty() {
                return true;
            }
            if entry.file_name() == ".git" || entry.file_name() == ".lg-cache" {
                return false;
            }
            if gitignore.is_dir_ignored(&rel) {
                return false;
            }
            dir_pruner(&rel)
        });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(rel) = rel_posix(path, root) else {
            continue;
        };
        if gitignore.is_ignored(&rel) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();
        if !extensions.contains(&ext) && !SPECIAL_NAMES.contains(&name.as_ref()) {
            continue;
        }

        out.push(path.to_path_buf());
    }

    out.sort();
    out
}

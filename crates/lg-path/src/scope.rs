//! Scope and repo-root discovery.
//!
//! A *scope* is any directory containing an `lg-cfg/` subdirectory; the
//! repository root is the top-most scope on the way up from the starting
//! directory.

use std::path::{Path, PathBuf};

/// Name of the per-scope configuration directory.
pub const CFG_DIR: &str = "lg-cfg";

/// Name of the main section file inside `lg-cfg/`.
pub const SECTIONS_FILE: &str = "sections.yaml";

/// Absolute path of the `lg-cfg/` directory for a scope.
pub fn cfg_root(scope_dir: &Path) -> PathBuf {
    scope_dir.join(CFG_DIR)
}

/// True if the directory is a scope (has an `lg-cfg/` subdirectory).
pub fn is_scope(dir: &Path) -> bool {
    cfg_root(dir).is_dir()
}

/// Quick check whether a POSIX-relative path lives inside `lg-cfg/`.
///
/// Used by tree-walk pruners to treat configuration files specially.
pub fn is_cfg_relpath(rel: &str) -> bool {
    rel == CFG_DIR || rel.starts_with("lg-cfg/")
}

/// Finds the repository root: the top-most ancestor of `start` (inclusive)
/// that is a scope.
///
/// Returns `None` if no ancestor carries an `lg-cfg/` directory.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut found: Option<PathBuf> = None;
    let mut current = Some(start);
    while let Some(dir) = current {
        if is_scope(dir) {
            found = Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    found
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn finds_topmost_scope() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("lg-cfg")).unwrap();
        fs::create_dir_all(root.join("apps/web/lg-cfg")).unwrap();
        fs::create_dir_all(root.join("apps/web/src")).unwrap();

        let found = find_repo_root(&root.join("apps/web/src")).unwrap();
        assert_eq!(found, root);
    }

    #[test]
    fn no_scope_yields_none() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("a/b");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_repo_root(&sub), None);
    }

    #[test]
    fn cfg_relpath_detection() {
        assert!(is_cfg_relpath("lg-cfg"));
        assert!(is_cfg_relpath("lg-cfg/sections.yaml"));
        assert!(!is_cfg_relpath("src/lg-cfg.rs"));
        assert!(!is_cfg_relpath("lg-cfgx"));
    }
}

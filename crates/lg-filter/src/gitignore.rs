//! A `.gitignore` subset matcher.
//!
//! Supports the common cases the walker needs: blank lines and comments are
//! skipped, a leading `/` anchors at the repository root, a trailing `/`
//! matches the directory subtree, and bare patterns float to any depth.
//! Negation (`!`) is not supported; such lines are logged and ignored.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled `.gitignore` rules for one repository root.
#[derive(Debug, Default)]
pub struct GitignoreMatcher {
    /// Patterns matching files or directories.
    rules: Option<GlobSet>,
}

impl GitignoreMatcher {
    /// Loads `<root>/.gitignore`; an absent or unreadable file matches
    /// nothing.
    pub fn load(root: &Path) -> Self {
        let path = root.join(".gitignore");
        let Ok(text) = fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::from_lines(text.lines())
    }

    /// Builds a matcher from gitignore lines.
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut any = false;
        for raw in lines {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('!') {
                tracing::warn!(pattern = line, "gitignore negation not supported, ignored");
                continue;
            }

            let anchored = line.starts_with('/');
            let mut body = line.trim_start_matches('/').to_string();
            let dir_only = body.ends_with('/');
            if dir_only {
                body.pop();
            }

            let mut variants = vec![body.clone(), format!("{body}/**")];
            if !anchored {
                variants.push(format!("**/{body}"));
                variants.push(format!("**/{body}/**"));
            }
            for variant in variants {
                if let Ok(glob) = Glob::new(&variant) {
                    builder.add(glob);
                    any = true;
                } else {
                    tracing::warn!(pattern = variant, "unparseable gitignore pattern ignored");
                }
            }
        }
        Self {
            rules: any.then(|| builder.build().ok()).flatten(),
        }
    }

    /// Whether a file path (POSIX, repo-relative) is ignored.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.rules
            .as_ref()
            .is_some_and(|rules| rules.is_match(rel_path))
    }

    /// Whether a directory path is ignored (prunes the whole subtree).
    pub fn is_dir_ignored(&self, rel_dir: &str) -> bool {
        self.is_ignored(rel_dir)
    }
}

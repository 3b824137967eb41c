//! The directory-context stack.
//!
//! Template expansion is a tree walk across files and scopes; relative
//! references resolve against the *innermost* frame. Every expansion wraps
//! its work in a push/pop pair, so the stack always mirrors the include
//! chain.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use lg_path::parent_posix;

/// One frame of the directory stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryContext {
    /// Scope label: `"self"` for the run's base scope, otherwise the
    /// scope's repo-relative path (`""` for the repository root).
    pub origin: String,
    /// Current directory inside `lg-cfg/` (POSIX, no leading slash).
    pub current_dir: String,
    /// Absolute path of this scope's `lg-cfg/`.
    pub cfg_root: PathBuf,
}

/// Stack of directory contexts for one run.
#[derive(Debug)]
pub struct AddressingContext {
    /// Repository root (top-most scope).
    repo_root: PathBuf,
    /// The frame stack; never empty.
    stack: RefCell<Vec<DirectoryContext>>,
}

impl AddressingContext {
    /// Creates a context rooted at the repository root's scope.
    pub fn new(repo_root: &Path) -> Self {
        let base = DirectoryContext {
            origin: "self".to_string(),
            current_dir: String::new(),
            cfg_root: lg_path::cfg_root(repo_root),
        };
        Self {
            repo_root: repo_root.to_path_buf(),
            stack: RefCell::new(vec![base]),
        }
    }

    /// The repository root.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The innermost frame.
    pub fn current(&self) -> DirectoryContext {
        self.stack
            .borrow()
            .last()
            .expect("directory stack is never empty")
            .clone()
    }

    /// Pushes a frame for a file being expanded.
    ///
    /// `file_rel` is the file's path inside its `lg-cfg/`. Without a new
    /// origin the frame stays in the current scope and the current
    /// directory becomes the file's directory. With a new origin the frame
    /// switches scope and, by contract, the current directory resets to
    /// empty.
    pub fn push_file(&self, cfg_root: &Path, file_rel: &str, new_origin: Option<String>) {
        let frame = match new_origin {
            Some(origin) => DirectoryContext {
                origin,
                current_dir: String::new(),
                cfg_root: cfg_root.to_path_buf(),
            },
            None => DirectoryContext {
                origin: self.current().origin,
                current_dir: parent_posix(file_rel).to_string(),
                cfg_root: cfg_root.to_path_buf(),
            },
        };
        self.stack.borrow_mut().push(frame);
    }

    /// Pops the innermost frame. The base frame is never popped.
    pub fn pop(&self) {
        let mut stack = self.stack.borrow_mut();
        if stack.len() > 1 {
            stack.pop();
        }
    }

    /// Depth of the stack (1 = only the base frame).
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_frame_is_root_scope() {
        let ctx = AddressingContext::new(Path::new("/repo"));
        let frame = ctx.current();
        assert_eq!(frame.origin, "self");
        assert_eq!(frame.current_dir, "");
        assert_eq!(frame.cfg_root, PathBuf::from("/repo/lg-cfg"));
    }

    #[test]
    fn push_file_tracks_directory() {
        let ctx = AddressingContext::new(Path::new("/repo"));
        ctx.push_file(Path::new("/repo/lg-cfg"), "sub/deep/_.ctx.md", None);
        assert_eq!(ctx.current().current_dir, "sub/deep");
        assert_eq!(ctx.current().origin, "self");
        ctx.pop();
        assert_eq!(ctx.current().current_dir, "");
    }

    #[test]
    fn new_origin_resets_current_dir() {
        let ctx = AddressingContext::new(Path::new("/repo"));
        ctx.push_file(Path::new("/repo/lg-cfg"), "sub/a.tpl.md", None);
        assert_eq!(ctx.current().current_dir, "sub");

        // Crossing a scope boundary resets the directory, even though the
        // target file itself lives in a subdirectory.
        ctx.push_file(
            Path::new("/repo/apps/web/lg-cfg"),
            "nested/b.tpl.md",
            Some("apps/web".to_string()),
        );
        let frame = ctx.current();
        assert_eq!(frame.current_dir, "");
        assert_eq!(frame.origin, "apps/web");
        assert_eq!(frame.cfg_root, PathBuf::from("/repo/apps/web/lg-cfg"));

        ctx.pop();
        assert_eq!(ctx.current().current_dir, "sub");
    }

    #[test]
    fn base_frame_survives_extra_pops() {
        let ctx = AddressingContext::new(Path::new("/repo"));
        ctx.pop();
        ctx.pop();
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.current().origin, "self");
    }
}

//! Change-set providers for lg.
//!
//! The engine treats version control as an external collaborator: a
//! [`VcsProvider`] answers "which paths changed" for the working tree or a
//! branch diff. [`GitVcs`] shells out to `git`; [`NullVcs`] reports nothing
//! changed and backs non-Git checkouts.

#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Which files a render considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VcsMode {
    /// Every file the filters admit.
    #[default]
    All,
    /// Only working-tree changes (staged, unstaged, untracked).
    Changes,
    /// Only changes relative to a target branch's merge-base.
    BranchChanges,
}

impl VcsMode {
    /// Parses the configuration spelling (`all`/`changes`/`branch-changes`).
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "all" => Some(Self::All),
            "changes" => Some(Self::Changes),
            "branch-changes" => Some(Self::BranchChanges),
            _ => None,
        }
    }

    /// The configuration spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Changes => "changes",
            Self::BranchChanges => "branch-changes",
        }
    }
}

/// Answers change-set queries for a repository.
///
/// All paths returned are POSIX-relative to the repository root.
pub trait VcsProvider {
    /// Paths changed in the working tree: unstaged, staged, and untracked.
    fn changed_files(&self, root: &Path) -> BTreeSet<String>;

    /// Paths changed on the current branch relative to a target branch
    /// (merge-base diff), unioned with the working-tree changes.
    fn branch_changed_files(&self, root: &Path, target_branch: Option<&str>) -> BTreeSet<String>;
}

/// Fallback provider when Git is unavailable: nothing ever changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVcs;

impl VcsProvider for NullVcs {
    fn changed_files(&self, _root: &Path) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn branch_changed_files(&self, _root: &Path, _target: Option<&str>) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Git-backed provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitVcs;

impl GitVcs {
    /// True if `root` looks like a Git work tree.
    pub fn available(root: &Path) -> bool {
        root.join(".git").is_dir()
    }
}

/// Runs `git -C <root> <args>` and returns non-empty trimmed output lines.
///
/// Any failure (git missing, not a repository) yields an empty list; the
/// engine then behaves as if nothing changed.
fn git_lines(root: &Path, args: &[&str]) -> Vec<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output();
    let Ok(output) = output else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Finds the base commit for a branch diff.
///
/// With an explicit target branch, resolves it (locally, then as
/// `origin/<branch>`) and takes the merge-base with `HEAD`. Without one,
/// probes the usual mainline candidates.
fn find_merge_base(root: &Path, target_branch: Option<&str>) -> Option<String> {
    if let Some(branch) = target_branch {
        let mut resolved = branch.to_string();
        let local = git_lines(root, &["show-ref", "--verify", &format!("refs/heads/{branch}")]);
        if local.is_empty() {
            let remote = git_lines(
                root,
                &["show-ref", "--verify", &format!("refs/remotes/origin/{branch}")],
            );
            if !remote.is_empty() {
                resolved = format!("origin/{branch}");
            }
        }
        let base = git_lines(root, &["merge-base", "HEAD", &resolved]);
        return base.into_iter().next().or(Some(resolved));
    }

    let candidates = [
        "origin/main",
        "origin/master",
        "upstream/main",
        "upstream/master",
        "main",
        "master",
    ];
    for candidate in candidates {
        let ref_name = if candidate.contains('/') {
            format!("refs/remotes/{candidate}")
        } else {
            format!("refs/heads/{candidate}")
        };
        if git_lines(root, &["show-ref", "--verify", &ref_name]).is_empty() {
            continue;
        }
        if let Some(base) = git_lines(root, &["merge-base", "HEAD", candidate]).into_iter().next() {
            return Some(base);
        }
    }
    None
}

/// Normalises a path from git output to POSIX form.
fn to_posix(line: String) -> String {
    PathBuf::from(line)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl VcsProvider for GitVcs {
    fn changed_files(&self, root: &Path) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        out.extend(git_lines(root, &["diff", "--name-only"]).into_iter().map(to_posix));
        out.extend(
            git_lines(root, &["diff", "--name-only", "--cached"])
                .into_iter()
                .map(to_posix),
        );
        out.extend(
            git_lines(root, &["ls-files", "--others", "--exclude-standard"])
                .into_iter()
                .map(to_posix),
        );
        out
    }

    fn branch_changed_files(&self, root: &Path, target_branch: Option<&str>) -> BTreeSet<String> {
        let Some(base) = find_merge_base(root, target_branch) else {
            return self.changed_files(root);
        };
        let mut out = BTreeSet::new();
        out.extend(
            git_lines(root, &["diff", "--name-only", &format!("{base}..HEAD")])
                .into_iter()
                .map(to_posix),
        );
        out.extend(self.changed_files(root));
        out
    }
}

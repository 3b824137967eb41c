//! Restricted filesystem surface for migrations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A small filesystem handle whose operations are confined to one
/// `lg-cfg/` directory.
///
/// Migrations only ever see this type, which keeps their blast radius
/// inside the configuration directory.
#[derive(Debug, Clone)]
pub struct CfgFs {
    /// Repository root.
    repo_root: PathBuf,
    /// The `lg-cfg/` directory migrations operate on.
    cfg_root: PathBuf,
}

impl CfgFs {
    /// Creates a handle for a repository's `lg-cfg/` directory.
    pub fn new(repo_root: &Path, cfg_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            cfg_root: cfg_root.to_path_buf(),
        }
    }

    /// The repository root this configuration belongs to.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The `lg-cfg/` directory.
    pub fn cfg_root(&self) -> &Path {
        &self.cfg_root
    }

    /// Whether a path exists inside `lg-cfg/`.
    pub fn exists(&self, rel: &str) -> bool {
        self.cfg_root.join(rel).exists()
    }

    /// Reads a text file inside `lg-cfg/`.
    pub fn read_text(&self, rel: &str) -> io::Result<String> {
        fs::read_to_string(self.cfg_root.join(rel))
    }

    /// Writes a text file inside `lg-cfg/` atomically (temp + rename).
    pub fn write_text_atomic(&self, rel: &str, content: &str) -> io::Result<()> {
        let path = self.cfg_root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
    }

    /// Moves a file inside `lg-cfg/` (copy + atomic rename + unlink).
    pub fn move_atomic(&self, src_rel: &str, dst_rel: &str) -> io::Result<()> {
        let src = self.cfg_root.join(src_rel);
        let content = fs::read_to_string(&src)?;
        self.write_text_atomic(dst_rel, &content)?;
        fs::remove_file(&src)
    }

    /// Removes a file inside `lg-cfg/`, ignoring a missing target.
    pub fn remove(&self, rel: &str) -> io::Result<()> {
        match fs::remove_file(self.cfg_root.join(rel)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Lists files under a relative directory, as paths relative to it.
    ///
    /// Returns an empty list when the directory is absent.
    pub fn list_files(&self, rel_dir: &str) -> Vec<String> {
        let dir = if rel_dir.is_empty() {
            self.cfg_root.clone()
        } else {
            self.cfg_root.join(rel_dir)
        };
        let mut out = Vec::new();
        let Ok(entries) = fs::read_dir(&dir) else {
            return out;
        };
        for entry in entries.flatten() {
            if entry.path().is_file() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        out
    }
}

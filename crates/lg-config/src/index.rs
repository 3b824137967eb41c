//! The per-scope section index.
//!
//! Maps section keys to their defining file. Sections from nested
//! directories are keyed with the directory prefix: a section `src` defined
//! in `lg-cfg/sub/sections.yaml` (or any `lg-cfg/sub/*.sec.yaml`) gets the
//! key `sub/src`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_yaml::Value as Yaml;

use lg_path::{SECTIONS_FILE, join_posix, rel_posix};

use crate::error::ConfigError;

/// Physical location of one section definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLocation {
    /// The YAML file defining the section.
    pub file_path: PathBuf,
    /// Top-level key inside that file.
    pub local_name: String,
}

/// Index of every section in one scope, with the file mtimes it was built
/// from (for invalidation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeIndex {
    /// Section key → location.
    pub sections: BTreeMap<String, SectionLocation>,
    /// Config file → mtime in nanoseconds at build time.
    pub file_mtimes: BTreeMap<PathBuf, u64>,
}

impl ScopeIndex {
    /// Checks whether the index still matches the filesystem: every indexed
    /// file exists with an unchanged mtime and no config file was added or
    /// removed.
    pub fn is_valid(&self, cfg_root: &Path) -> bool {
        for (path, cached_mtime) in &self.file_mtimes {
            match mtime_ns(path) {
                Some(current) if current == *cached_mtime => {}
                _ => return false,
            }
        }
        let current: Vec<PathBuf> = iter_config_files(cfg_root);
        if current.len() != self.file_mtimes.len() {
            return false;
        }
        current.iter().all(|p| self.file_mtimes.contains_key(p))
    }
}

fn mtime_ns(path: &Path) -> Option<u64> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_nanos() as u64)
}

/// True for files the index reads: `sections.yaml` and `*.sec.yaml`.
fn is_config_file(name: &str) -> bool {
    name == SECTIONS_FILE || name.ends_with(".sec.yaml")
}

/// Lists all section config files under a `lg-cfg/` directory, sorted.
pub fn iter_config_files(cfg_root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![cfg_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .file_name()
                .map(|n| is_config_file(&n.to_string_lossy()))
                .unwrap_or(false)
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

/// Builds the section index for one scope.
///
/// Files in nested directories contribute sections under the directory
/// prefix. Duplicate keys keep the first definition in sorted-file order;
/// the duplicate is logged and ignored.
pub fn build_index(cfg_root: &Path) -> Result<ScopeIndex, ConfigError> {
    let mut index = ScopeIndex::default();

    for file_path in iter_config_files(cfg_root) {
        if let Some(ns) = mtime_ns(&file_path) {
            index.file_mtimes.insert(file_path.clone(), ns);
        }

        let text = fs::read_to_string(&file_path).map_err(|source| ConfigError::ReadFile {
            path: file_path.clone(),
            source,
        })?;
        let doc: Yaml = serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseYaml {
            path: file_path.clone(),
            source,
        })?;
        let map = match doc {
            Yaml::Mapping(map) => map,
            Yaml::Null => continue,
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: file_path.clone(),
                });
            }
        };

        let dir_prefix = file_path
            .parent()
            .and_then(|p| rel_posix(p, cfg_root))
            .unwrap_or_default();

        for (key, _) in &map {
            let Some(local_name) = key.as_str() else {
                return Err(ConfigError::NotAMapping {
                    path: file_path.clone(),
                });
            };
            let index_key = join_posix(&dir_prefix, local_name);
            if index.sections.contains_key(&index_key) {
                tracing::warn!(
                    key = %index_key,
                    file = %file_path.display(),
                    "duplicate section definition ignored"
                );
                continue;
            }
            index.sections.insert(
                index_key,
                SectionLocation {
                    file_path: file_path.clone(),
                    local_name: local_name.to_string(),
                },
            );
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn indexes_sections_and_sec_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        write(&cfg.join("sections.yaml"), "src: {}\ndocs: {}\n");
        write(&cfg.join("ai.sec.yaml"), "ai-interaction: {}\n");

        let index = build_index(&cfg).unwrap();
        let keys: Vec<&String> = index.sections.keys().collect();
        assert_eq!(keys, vec!["ai-interaction", "docs", "src"]);
        assert_eq!(index.sections["ai-interaction"].local_name, "ai-interaction");
        assert_eq!(
            index.sections["ai-interaction"].file_path,
            cfg.join("ai.sec.yaml")
        );
    }

    #[test]
    fn nested_directories_get_prefixed_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        write(&cfg.join("sections.yaml"), "src: {}\n");
        write(&cfg.join("sub/sections.yaml"), "src: {}\n");
        write(&cfg.join("sub/tags.sec.yaml"), "tags: {}\n");

        let index = build_index(&cfg).unwrap();
        assert!(index.sections.contains_key("src"));
        assert!(index.sections.contains_key("sub/src"));
        assert!(index.sections.contains_key("sub/tags"));
        assert_eq!(index.sections["sub/tags"].local_name, "tags");
    }

    #[test]
    fn validity_tracks_mtime_and_file_set() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        write(&cfg.join("sections.yaml"), "src: {}\n");

        let index = build_index(&cfg).unwrap();
        assert!(index.is_valid(&cfg));

        // Adding a file invalidates.
        write(&cfg.join("more.sec.yaml"), "extra: {}\n");
        assert!(!index.is_valid(&cfg));
    }

    #[test]
    fn empty_file_contributes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        write(&cfg.join("sections.yaml"), "");
        let index = build_index(&cfg).unwrap();
        assert!(index.sections.is_empty());
    }

    #[test]
    fn non_mapping_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        write(&cfg.join("sections.yaml"), "- just\n- a list\n");
        assert!(matches!(
            build_index(&cfg),
            Err(ConfigError::NotAMapping { .. })
        ));
    }
}

//! The section store.
//!
//! Single point of access to sections: index lookup, lazy config loading,
//! memory + disk caching, and the migration hook that keeps `lg-cfg/` at
//! the current format before it is read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use lg_cache::Cache;
use lg_migrate::MigrationRunner;
use lg_path::{cfg_root, rel_posix, sha1_hex};

use crate::error::ConfigError;
use crate::index::{ScopeIndex, SectionLocation, build_index};
use crate::model::SectionConfig;

/// On-disk index format version.
const INDEX_VERSION: &str = "1.0";

/// Wrapper stored at `sections/<scope-key>.index`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredIndex {
    /// Format version; any mismatch is a miss.
    version: String,
    /// The index itself.
    #[serde(flatten)]
    index: ScopeIndex,
}

/// Service for finding and loading sections across scopes.
pub struct SectionStore {
    /// Repository root.
    root: PathBuf,
    /// Shared cache for the persisted index.
    cache: Rc<Cache>,
    /// Tool version passed to the migration runner.
    tool_version: String,
    /// Whether migrations run before an index is built (off in peek mode).
    migrate: bool,
    /// Per-scope index cache.
    indexes: RefCell<HashMap<PathBuf, Rc<ScopeIndex>>>,
    /// Loaded section configs keyed by (file, local name).
    loaded: RefCell<HashMap<(PathBuf, String), Rc<SectionConfig>>>,
}

impl SectionStore {
    /// Creates a store rooted at the repository root.
    pub fn new(root: &Path, cache: Rc<Cache>, tool_version: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            cache,
            tool_version: tool_version.to_string(),
            migrate: true,
            indexes: RefCell::new(HashMap::new()),
            loaded: RefCell::new(HashMap::new()),
        }
    }

    /// Disables the migration hook (diagnostics-safe "peek" mode).
    pub fn without_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    /// The repository root this store serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the section index for a scope, building it if needed.
    pub fn get_index(&self, scope_dir: &Path) -> Result<Rc<ScopeIndex>, ConfigError> {
        let scope_dir = scope_dir.to_path_buf();
        if let Some(index) = self.indexes.borrow().get(&scope_dir) {
            return Ok(Rc::clone(index));
        }

        let cfg = cfg_root(&scope_dir);
        if !cfg.is_dir() {
            return Err(ConfigError::ScopeNotFound { scope_dir });
        }

        if self.migrate {
            MigrationRunner::new(&self.cache, &self.tool_version).ensure_current(&cfg)?;
        }

        // Disk cache, validated against the live tree.
        if let Some(stored) = self.load_index_from_disk(&scope_dir) {
            if stored.is_valid(&cfg) {
                let index = Rc::new(stored);
                self.indexes
                    .borrow_mut()
                    .insert(scope_dir, Rc::clone(&index));
                return Ok(index);
            }
        }

        let index = Rc::new(build_index(&cfg)?);
        self.save_index_to_disk(&scope_dir, &index);
        self.indexes
            .borrow_mut()
            .insert(scope_dir, Rc::clone(&index));
        Ok(index)
    }

    /// Finds a section by reference within a scope.
    ///
    /// Absolute references (`/name`) search exactly that key. Relative
    /// references try `current_dir/name` first, then `name`.
    ///
    /// Returns the canonical index key together with the location.
    pub fn find_section(
        &self,
        name: &str,
        current_dir: &str,
        scope_dir: &Path,
    ) -> Result<(String, SectionLocation), ConfigError> {
        let index = self.get_index(scope_dir)?;

        if let Some(key) = name.strip_prefix('/') {
            if let Some(location) = index.sections.get(key) {
                return Ok((key.to_string(), location.clone()));
            }
            return Err(ConfigError::SectionNotFound {
                name: name.to_string(),
                searched: vec![key.to_string()],
            });
        }

        let mut searched = Vec::new();
        if !current_dir.is_empty() {
            let prefixed = format!("{current_dir}/{name}");
            if let Some(location) = index.sections.get(&prefixed) {
                return Ok((prefixed, location.clone()));
            }
            searched.push(prefixed);
        }
        if let Some(location) = index.sections.get(name) {
            return Ok((name.to_string(), location.clone()));
        }
        searched.push(name.to_string());

        Err(ConfigError::SectionNotFound {
            name: name.to_string(),
            searched,
        })
    }

    /// Lazily loads a section's configuration.
    pub fn load_section(&self, location: &SectionLocation) -> Result<Rc<SectionConfig>, ConfigError> {
        let key = (location.file_path.clone(), location.local_name.clone());
        if let Some(config) = self.loaded.borrow().get(&key) {
            return Ok(Rc::clone(config));
        }

        let text =
            std::fs::read_to_string(&location.file_path).map_err(|source| ConfigError::ReadFile {
                path: location.file_path.clone(),
                source,
            })?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseYaml {
                path: location.file_path.clone(),
                source,
            })?;
        let node = doc
            .get(location.local_name.as_str())
            .ok_or_else(|| ConfigError::InvalidSection {
                section: location.local_name.clone(),
                path: location.file_path.clone(),
                message: "section key missing from file".to_string(),
            })?;

        let config = SectionConfig::from_yaml(&location.local_name, node).map_err(|message| {
            ConfigError::InvalidSection {
                section: location.local_name.clone(),
                path: location.file_path.clone(),
                message,
            }
        })?;

        let config = Rc::new(config);
        self.loaded.borrow_mut().insert(key, Rc::clone(&config));
        Ok(config)
    }

    /// Lists renderable (non-meta) section keys in a scope, sorted.
    pub fn list_renderable(&self, scope_dir: &Path) -> Result<Vec<String>, ConfigError> {
        let index = self.get_index(scope_dir)?;
        let mut out = Vec::new();
        for (key, location) in &index.sections {
            if !self.load_section(location)?.is_meta() {
                out.push(key.clone());
            }
        }
        Ok(out)
    }

    // ------------------------------ disk cache ----------------------------- //

    /// Stable cache key for a scope: its repo-relative path with separators
    /// replaced, or a hash when it lies outside the repository.
    fn scope_key(&self, scope_dir: &Path) -> String {
        match rel_posix(scope_dir, &self.root) {
            Some(rel) if rel.is_empty() => "root".to_string(),
            Some(rel) => rel.replace('/', "_"),
            None => sha1_hex(&scope_dir.to_string_lossy())[..16].to_string(),
        }
    }

    fn load_index_from_disk(&self, scope_dir: &Path) -> Option<ScopeIndex> {
        let path = self.cache.sections_index_path(&self.scope_key(scope_dir));
        let stored: StoredIndex = self.cache.read_json(&path)?;
        if stored.version != INDEX_VERSION {
            return None;
        }
        Some(stored.index)
    }

    fn save_index_to_disk(&self, scope_dir: &Path, index: &ScopeIndex) {
        let path = self.cache.sections_index_path(&self.scope_key(scope_dir));
        self.cache.write_json_atomic(
            &path,
            &StoredIndex {
                version: INDEX_VERSION.to_string(),
                index: index.clone(),
            },
        );
    }
}

//! The adapter pipeline.
//!
//! Drives files from a section manifest through their adapters: merges the
//! section-level adapter options with per-file overrides, memoises bound
//! adapters per frozen option map, and caches processed blobs by file
//! fingerprint + configuration + active tags.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::{Value, json};

use lg_cache::{Cache, freeze_json};
use lg_cond::ConditionContext;
use lg_config::Options;
use lg_filter::FileEntry;
use lg_path::FileFingerprint;

use crate::adapter::{AdapterContext, BoundAdapter, Meta};
use crate::registry::AdapterRegistry;

/// Group shape the renderer decided for a file; adapters may vary their
/// output on it, so it is part of the processing identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Number of files in the group.
    pub size: usize,
    /// Whether the group mixes languages.
    pub mixed: bool,
    /// The group's fence language.
    pub lang: String,
}

/// The output of processing one file.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// POSIX path relative to the repository root.
    pub rel_path: String,
    /// Adapter output, trimmed to end with exactly one newline.
    pub processed_text: String,
    /// The raw file text.
    pub raw_text: String,
    /// Adapter meta counters and diagnostics.
    pub meta: Meta,
    /// Identity of the processed blob in the cache.
    pub cache_key: String,
}

/// A pipeline bound to one run's services and state.
pub struct Pipeline<'a> {
    /// The adapter table.
    registry: &'a AdapterRegistry,
    /// Blob cache.
    cache: &'a Cache,
    /// Condition context for adapters that evaluate conditions.
    conditions: &'a ConditionContext,
    /// Active tags, part of every blob's cache key.
    active_tags: Vec<String>,
    /// Bound adapters memoised per (adapter name, frozen options).
    bound: RefCell<HashMap<(String, String), Rc<dyn BoundAdapter>>>,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline for one run.
    pub fn new(
        registry: &'a AdapterRegistry,
        cache: &'a Cache,
        conditions: &'a ConditionContext,
        active_tags: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            registry,
            cache,
            conditions,
            active_tags: active_tags.into_iter().collect(),
            bound: RefCell::new(HashMap::new()),
        }
    }

    /// Processes one manifest entry.
    ///
    /// Returns `None` when the file is skipped: adapter heuristics
    /// (`should_skip`) or an unreadable file; both are logged, never
    /// errors.
    pub fn process_file(
        &self,
        entry: &FileEntry,
        section_cfg: &BTreeMap<String, Options>,
        group: &GroupInfo,
        section_key: &str,
    ) -> Option<ProcessedFile> {
        let adapter = self.registry.adapter_for_path(&entry.abs_path);
        let adapter_name = adapter.name();

        // Section options plus per-file target overrides; local keys win.
        let mut raw_cfg: Options = section_cfg.get(adapter_name).cloned().unwrap_or_default();
        if let Some(overrides) = entry.adapter_overrides.get(adapter_name) {
            for (key, value) in overrides {
                raw_cfg.insert(key.clone(), value.clone());
            }
        }

        let frozen_cfg = Value::Object(raw_cfg.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        let bind_key = (adapter_name.to_string(), freeze_json(&frozen_cfg));
        let bound = {
            let mut bound_cache = self.bound.borrow_mut();
            let entry_ref = bound_cache
                .entry(bind_key)
                .or_insert_with(|| Rc::from(adapter.bind(&raw_cfg)));
            Rc::clone(entry_ref)
        };

        let raw_text = match fs::read_to_string(&entry.abs_path) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    path = %entry.abs_path.display(),
                    error = %err,
                    "unreadable file skipped"
                );
                return None;
            }
        };

        let extension = entry
            .abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let ctx = AdapterContext {
            path: &entry.abs_path,
            raw_text: &raw_text,
            extension: &extension,
            group_size: group.size,
            mixed: group.mixed,
            conditions: self.conditions,
        };

        if adapter_name != "base" && bound.should_skip(&ctx) {
            tracing::debug!(path = %entry.rel_path, adapter = adapter_name, "adapter skipped file");
            return None;
        }

        let fingerprint = FileFingerprint::of(&entry.abs_path)
            .unwrap_or_else(|_| FileFingerprint::missing(&entry.abs_path));
        let (cache_key, key_path) =
            self.cache
                .processed_key(&fingerprint, adapter_name, &frozen_cfg, &self.active_tags);

        let (processed_text, meta) = match self.cache.get_processed(&key_path) {
            Some(cached) => (cached.processed_text, cached.meta),
            None => {
                let (text, mut meta) = bound.process(&ctx);
                meta.insert("_group_size".to_string(), json!(group.size));
                meta.insert("_group_mixed".to_string(), json!(group.mixed));
                meta.insert("_group_lang".to_string(), json!(group.lang));
                meta.insert("_section".to_string(), json!(section_key));
                if !raw_cfg.is_empty() {
                    let keys: Vec<&str> = raw_cfg.keys().map(String::as_str).collect();
                    meta.insert("_adapter_cfg_keys".to_string(), json!(keys.join(",")));
                }
                self.cache.put_processed(&key_path, &text, &meta);
                (text, meta)
            }
        };

        Some(ProcessedFile {
            abs_path: entry.abs_path.clone(),
            rel_path: entry.rel_path.clone(),
            processed_text: format!("{}\n", processed_text.trim_end_matches('\n')),
            raw_text,
            meta,
            cache_key,
        })
    }
}

//! The on-disk cache store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use lg_path::{FileFingerprint, sha1_hex};

use crate::freeze::freeze_json;
use crate::tokens::TextKey;

/// On-disk format version for cache entries.
const CACHE_VERSION: u32 = 1;

/// L1 capacity (entries).
const L1_CAPACITY: usize = 10_000;

/// Name of the cache directory under the repository root.
const CACHE_DIR: &str = ".lg-cache";

/// A processed-blob cache entry.
#[derive(Debug, Clone)]
pub struct ProcessedEntry {
    /// The adapter's output text.
    pub processed_text: String,
    /// The adapter's meta counters and diagnostics.
    pub meta: BTreeMap<String, Value>,
}

/// Best-effort snapshot of the cache state, for diagnostics.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Whether the cache is enabled.
    pub enabled: bool,
    /// The cache directory.
    pub path: PathBuf,
    /// Number of files currently stored.
    pub entries: u64,
    /// Total size in bytes.
    pub size_bytes: u64,
}

/// The two-tier cache.
///
/// Single-threaded: the engine processes files sequentially; the L1 map
/// uses interior mutability so the cache can be shared by `&` reference
/// across the pipeline.
#[derive(Debug)]
pub struct Cache {
    /// Whether L2 persistence is active.
    enabled: bool,
    /// Fresh mode: reads always miss, writes still happen.
    fresh: bool,
    /// Tool version baked into processed keys.
    tool_version: String,
    /// Cache directory (`<repo>/.lg-cache`).
    dir: PathBuf,
    /// L1 token counts keyed by (text key, model).
    l1_tokens: RefCell<LruCache<(TextKey, String), u32>>,
}

impl Cache {
    /// Creates a cache rooted at `<repo_root>/.lg-cache`.
    ///
    /// `enabled` overrides the default (on); the `LG_CACHE` environment
    /// variable overrides both: any of `0`, `false`, `no`, `off`, or the
    /// empty string disables L2.
    pub fn new(repo_root: &Path, enabled: Option<bool>, fresh: bool, tool_version: &str) -> Self {
        let mut on = match std::env::var("LG_CACHE") {
            Ok(val) => !matches!(
                val.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off" | ""
            ),
            Err(_) => enabled.unwrap_or(true),
        };
        let dir = repo_root.join(CACHE_DIR);
        if on && fs::create_dir_all(&dir).is_err() {
            on = false;
        }
        Self {
            enabled: on,
            fresh,
            tool_version: tool_version.to_string(),
            dir,
            l1_tokens: RefCell::new(LruCache::new(
                NonZeroUsize::new(L1_CAPACITY).expect("nonzero capacity"),
            )),
        }
    }

    /// Whether L2 persistence is active.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The cache directory (`<repo>/.lg-cache`), whether or not it exists.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ------------------------------ tokens ------------------------------ //

    /// Looks up a token count for a text and model: L1 first, then L2.
    pub fn get_text_tokens(&self, text: &str, model: &str) -> Option<u32> {
        if text.is_empty() {
            return Some(0);
        }
        let key = (TextKey::of(text), model.to_string());
        if let Some(&count) = self.l1_tokens.borrow_mut().get(&key) {
            return Some(count);
        }
        let entry: Value = self.read_json(&self.bucket_path("tokens", &sha1_hex(text)))?;
        let count = entry.get("tokens")?.get(model)?.as_u64()? as u32;
        self.l1_tokens.borrow_mut().put(key, count);
        Some(count)
    }

    /// Records a token count for a text and model in both tiers.
    pub fn put_text_tokens(&self, text: &str, model: &str, count: u32) {
        if text.is_empty() {
            return;
        }
        let key = (TextKey::of(text), model.to_string());
        self.l1_tokens.borrow_mut().put(key, count);

        if !self.enabled {
            return;
        }
        let text_hash = sha1_hex(text);
        let path = self.bucket_path("tokens", &text_hash);
        // Merge with any counts other models already stored for this text.
        let mut entry: Value = self.read_json_ignore_fresh(&path).unwrap_or_else(|| {
            json!({
                "v": CACHE_VERSION,
                "text_hash": text_hash,
                "tokens": {},
                "created_at": now_epoch_secs(),
            })
        });
        if let Some(tokens) = entry.get_mut("tokens").and_then(Value::as_object_mut) {
            tokens.insert(model.to_string(), json!(count));
        }
        entry["updated_at"] = json!(now_epoch_secs());
        self.write_json_atomic(&path, &entry);
    }

    // ----------------------------- processed ---------------------------- //

    /// Builds the cache key for a processed blob.
    ///
    /// The key depends on exactly: the file fingerprint, the adapter name
    /// and frozen configuration, the active tag set, and the tool version.
    pub fn processed_key(
        &self,
        fingerprint: &FileFingerprint,
        adapter_name: &str,
        frozen_cfg: &Value,
        active_tags: &[String],
    ) -> (String, PathBuf) {
        let mut tags: Vec<&String> = active_tags.iter().collect();
        tags.sort();
        let payload = json!({
            "v": CACHE_VERSION,
            "kind": "processed",
            "file": {
                "path": fingerprint.path,
                "size": fingerprint.size,
                "mtime_ns": fingerprint.mtime_ns as u64,
            },
            "adapter": adapter_name,
            "cfg": frozen_cfg,
            "active_tags": tags,
            "tool": self.tool_version,
        });
        let hash = sha1_hex(&freeze_json(&payload));
        let path = self.bucket_path("processed", &hash);
        (hash, path)
    }

    /// Reads a processed blob by its key path.
    pub fn get_processed(&self, key_path: &Path) -> Option<ProcessedEntry> {
        let entry: Value = self.read_json(key_path)?;
        let processed_text = entry.get("processed_text")?.as_str()?.to_string();
        let meta = entry
            .get("meta")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Some(ProcessedEntry {
            processed_text,
            meta,
        })
    }

    /// Stores a processed blob at its key path.
    pub fn put_processed(&self, key_path: &Path, text: &str, meta: &BTreeMap<String, Value>) {
        let now = now_epoch_secs();
        let entry = json!({
            "v": CACHE_VERSION,
            "processed_text": text,
            "meta": meta,
            "created_at": now,
            "updated_at": now,
        });
        self.write_json_atomic(key_path, &entry);
    }

    // ----------------------------- cfg state ----------------------------- //

    /// Path of the migration-state entry for a `lg-cfg/` directory.
    fn cfg_state_path(&self, cfg_root: &Path) -> PathBuf {
        let hash = sha1_hex(&cfg_root.to_string_lossy());
        self.bucket_path("cfg_state", &hash)
    }

    /// Reads the stored migration state for a `lg-cfg/` directory.
    pub fn get_cfg_state<T: DeserializeOwned>(&self, cfg_root: &Path) -> Option<T> {
        self.read_json(&self.cfg_state_path(cfg_root))
    }

    /// Writes the migration state for a `lg-cfg/` directory.
    pub fn put_cfg_state<T: Serialize>(&self, cfg_root: &Path, state: &T) {
        self.write_json_atomic(&self.cfg_state_path(cfg_root), state);
    }

    // --------------------------- sections index --------------------------- //

    /// Path of the persisted section index for a scope key.
    pub fn sections_index_path(&self, scope_key: &str) -> PathBuf {
        self.dir.join("sections").join(format!("{scope_key}.index"))
    }

    /// Directory holding the migration lock for a scope hash.
    pub fn lock_dir(&self, scope_hash: &str) -> PathBuf {
        self.dir.join("locks").join(scope_hash)
    }

    // ------------------------------ raw I/O ------------------------------ //

    /// Reads a JSON file, honouring fresh mode (fresh reads always miss).
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        if self.fresh {
            return None;
        }
        self.read_json_ignore_fresh(path)
    }

    fn read_json_ignore_fresh<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Writes a JSON file atomically (temp file + rename). Best effort.
    pub fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) {
        if !self.enabled {
            return;
        }
        let Ok(data) = serde_json::to_string(value) else {
            return;
        };
        let Some(parent) = path.parent() else {
            return;
        };
        if fs::create_dir_all(parent).is_err() {
            return;
        }
        let tmp = path.with_extension("tmp");
        if fs::write(&tmp, data).is_ok() {
            let _ = fs::rename(&tmp, path);
        }
    }

    /// Removes the whole cache directory and recreates it empty.
    pub fn purge_all(&self) -> bool {
        let _ = fs::remove_dir_all(&self.dir);
        fs::create_dir_all(&self.dir).is_ok()
    }

    /// Collects a best-effort snapshot of the cache contents.
    pub fn snapshot(&self) -> CacheSnapshot {
        let mut entries = 0u64;
        let mut size_bytes = 0u64;
        let mut stack = vec![self.dir.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(read) = fs::read_dir(&dir) else {
                continue;
            };
            for item in read.flatten() {
                let path = item.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(meta) = path.metadata() {
                    entries += 1;
                    size_bytes += meta.len();
                }
            }
        }
        CacheSnapshot {
            enabled: self.enabled,
            path: self.dir.clone(),
            entries,
            size_bytes,
        }
    }

    /// Bucket path: `<dir>/<bucket>/<ab>/<cd>/<hash>.json`.
    fn bucket_path(&self, bucket: &str, hash: &str) -> PathBuf {
        self.dir
            .join(bucket)
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{hash}.json"))
    }
}

/// Seconds since the Unix epoch, for `created_at`/`updated_at` stamps.
fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

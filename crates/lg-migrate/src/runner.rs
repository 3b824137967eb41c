//! The migration runner.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use lg_cache::Cache;
use lg_path::{rel_posix, sha1_bytes, sha1_hex};

use crate::error::MigrationError;
use crate::fs::CfgFs;
use crate::lock::MigrationLock;
use crate::registry::{Migration, builtin_migrations};

/// Current configuration format level.
pub const CFG_CURRENT: u32 = 4;

/// Default age after which a sibling's lock is considered abandoned.
const DEFAULT_STALE_SECONDS: u64 = 120;

/// Default ceiling on waiting for a sibling's migration run.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// One successfully applied migration, recorded cumulatively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Migration id.
    pub id: u32,
    /// Migration title.
    pub title: String,
    /// Seconds since the Unix epoch when it was applied.
    pub at: u64,
}

/// Failure record kept in the state so the fast path stays off until the
/// problem is fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastError {
    /// User-facing message.
    pub message: String,
    /// Id of the failed migration.
    pub failed_id: u32,
    /// Phase: `run` or `preflight`.
    pub phase: String,
    /// Seconds since the Unix epoch.
    pub at: u64,
}

/// Persisted migration state for one `lg-cfg/` directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationState {
    /// Highest id successfully run.
    #[serde(default)]
    pub actual: u32,
    /// Fingerprint of `lg-cfg/` at the time of the last run.
    #[serde(default)]
    pub fingerprint: String,
    /// Tool version that wrote the state.
    #[serde(default)]
    pub tool: String,
    /// Cumulative history of applied migrations (never reset).
    #[serde(default)]
    pub applied: Vec<AppliedMigration>,
    /// Failure record from the last run, if any.
    #[serde(default)]
    pub last_error: Option<LastError>,
    /// Seconds since the Unix epoch of the last state write.
    #[serde(default)]
    pub updated_at: u64,
}

/// Fingerprint of the working-tree content of `lg-cfg/`: the SHA-1 over
/// sorted `F <sha1(bytes)> <rel_path>` lines.
///
/// Deliberately ignores the Git index so edits without `git add` are seen.
pub fn fingerprint_cfg(repo_root: &Path, cfg_root: &Path) -> String {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut stack = vec![cfg_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut lines = String::new();
    for path in files {
        let data = fs::read(&path).unwrap_or_default();
        let rel = rel_posix(&path, repo_root)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        lines.push_str(&format!("F {} {}\n", sha1_bytes(&data), rel));
    }
    sha1_hex(&lines)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn allow_no_git() -> bool {
    std::env::var("LG_MIGRATE_ALLOW_NO_GIT")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Brings one `lg-cfg/` directory up to [`CFG_CURRENT`].
pub struct MigrationRunner<'a> {
    /// Cache holding the migration state and the lock directory.
    cache: &'a Cache,
    /// Tool version recorded into the state.
    tool_version: String,
    /// Stale-steal threshold for the advisory lock.
    stale_seconds: u64,
    /// Ceiling on waiting for a sibling run.
    wait_timeout: Duration,
    /// Migrations to run, id-ordered.
    migrations: Vec<Box<dyn Migration>>,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner over the built-in migration table.
    pub fn new(cache: &'a Cache, tool_version: &str) -> Self {
        Self {
            cache,
            tool_version: tool_version.to_string(),
            stale_seconds: DEFAULT_STALE_SECONDS,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            migrations: builtin_migrations(),
        }
    }

    /// Overrides the lock timing parameters (used by tests).
    pub fn with_lock_params(mut self, stale_seconds: u64, wait_timeout: Duration) -> Self {
        self.stale_seconds = stale_seconds;
        self.wait_timeout = wait_timeout;
        self
    }

    /// Replaces the migration table (used by tests).
    pub fn with_migrations(mut self, migrations: Vec<Box<dyn Migration>>) -> Self {
        self.migrations = migrations;
        self.migrations.sort_by_key(|m| m.id());
        self
    }

    /// Ensures `lg-cfg/` is at the current format, migrating if needed.
    ///
    /// Fast path: when the stored fingerprint matches the working tree, the
    /// stored level is current, and no error is recorded, returns without
    /// taking the lock. Otherwise acquires the advisory lock (waiting for a
    /// sibling when necessary, then re-checking) and runs every migration in
    /// id order, persisting progress after each success.
    pub fn ensure_current(&self, cfg_root: &Path) -> Result<(), MigrationError> {
        let cfg_root = cfg_root.to_path_buf();
        let repo_root = cfg_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cfg_root.clone());

        let state: MigrationState = self.cache.get_cfg_state(&cfg_root).unwrap_or_default();
        if state.actual > CFG_CURRENT {
            return Err(MigrationError::FormatTooNew {
                stored: state.actual,
                supported: CFG_CURRENT,
            });
        }

        if self.fast_path(&state, &repo_root, &cfg_root) {
            return Ok(());
        }

        let scope_hash = sha1_hex(&cfg_root.to_string_lossy());
        let mut lock = MigrationLock::new(
            self.cache.lock_dir(&scope_hash),
            self.stale_seconds,
            self.wait_timeout,
        );

        if !lock.try_acquire() {
            // A sibling is migrating: wait for it, then re-read the state.
            lock.wait_for_completion()?;
            let state: MigrationState = self.cache.get_cfg_state(&cfg_root).unwrap_or_default();
            if self.fast_path(&state, &repo_root, &cfg_root) {
                return Ok(());
            }
            // Still not current (sibling failed or fingerprint moved): take
            // the lock ourselves.
            if !lock.try_acquire() {
                lock.wait_for_completion()?;
                if !lock.try_acquire() {
                    return Err(MigrationError::Timeout {
                        waited_secs: self.wait_timeout.as_secs(),
                    });
                }
            }
        }

        let result = self.run_all(&repo_root, &cfg_root, state);
        lock.release();
        result
    }

    fn fast_path(&self, state: &MigrationState, repo_root: &Path, cfg_root: &Path) -> bool {
        state.actual >= CFG_CURRENT
            && state.last_error.is_none()
            && !state.fingerprint.is_empty()
            && state.fingerprint == fingerprint_cfg(repo_root, cfg_root)
    }

    fn run_all(
        &self,
        repo_root: &Path,
        cfg_root: &Path,
        prior: MigrationState,
    ) -> Result<(), MigrationError> {
        let allow_side_effects = repo_root.join(".git").is_dir() || allow_no_git();
        let cfg_fs = CfgFs::new(repo_root, cfg_root);

        let mut applied = prior.applied;
        let mut actual = 0u32;

        for migration in &self.migrations {
            let id = migration.id();
            match migration.run(&cfg_fs, allow_side_effects) {
                Ok(changed) => {
                    actual = actual.max(id);
                    if changed && !applied.iter().any(|a| a.id == id) {
                        applied.push(AppliedMigration {
                            id,
                            title: migration.title().to_string(),
                            at: now_secs(),
                        });
                    }
                    // Persist progress after every migration so a crash
                    // resumes from here.
                    self.put_state(repo_root, cfg_root, actual, applied.clone(), None);
                }
                Err(err) => {
                    let phase = match &err {
                        MigrationError::PreflightRequired { .. } => "preflight",
                        _ => "run",
                    };
                    self.put_state(
                        repo_root,
                        cfg_root,
                        actual,
                        applied.clone(),
                        Some(LastError {
                            message: err.to_string(),
                            failed_id: id,
                            phase: phase.to_string(),
                            at: now_secs(),
                        }),
                    );
                    return Err(err);
                }
            }
        }

        // Pull the level up to CURRENT: later migrations may be pure no-ops
        // for this directory.
        actual = actual.max(CFG_CURRENT);
        self.put_state(repo_root, cfg_root, actual, applied, None);
        Ok(())
    }

    fn put_state(
        &self,
        repo_root: &Path,
        cfg_root: &Path,
        actual: u32,
        applied: Vec<AppliedMigration>,
        last_error: Option<LastError>,
    ) {
        let state = MigrationState {
            actual,
            fingerprint: fingerprint_cfg(repo_root, cfg_root),
            tool: self.tool_version.clone(),
            applied,
            last_error,
            updated_at: now_secs(),
        };
        self.cache.put_cfg_state(cfg_root, &state);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        fs::create_dir_all(&cfg).unwrap();
        fs::write(cfg.join("sections.yaml"), "src:\n  extensions: [\".py\"]\n").unwrap();
        (tmp, cfg)
    }

    struct CountingMigration {
        runs: Rc<Cell<u32>>,
    }

    impl Migration for CountingMigration {
        fn id(&self) -> u32 {
            1
        }
        fn title(&self) -> &'static str {
            "counting"
        }
        fn run(&self, _cfg_fs: &CfgFs, _allow: bool) -> Result<bool, MigrationError> {
            self.runs.set(self.runs.get() + 1);
            Ok(false)
        }
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let (tmp, cfg) = setup();
        let fp1 = fingerprint_cfg(tmp.path(), &cfg);
        fs::write(cfg.join("sections.yaml"), "docs:\n  extensions: [\".md\"]\n").unwrap();
        let fp2 = fingerprint_cfg(tmp.path(), &cfg);
        assert_ne!(fp1, fp2);
        // Stable across repeated reads.
        assert_eq!(fp2, fingerprint_cfg(tmp.path(), &cfg));
    }

    #[test]
    fn fast_path_skips_reruns() {
        let (tmp, cfg) = setup();
        let cache = Cache::new(tmp.path(), Some(true), false, "t1");
        let runs = Rc::new(Cell::new(0));

        let run_once = |runs: Rc<Cell<u32>>| {
            let runner = MigrationRunner::new(&cache, "t1")
                .with_migrations(vec![Box::new(CountingMigration { runs })]);
            runner.ensure_current(&cfg).unwrap();
        };

        run_once(Rc::clone(&runs));
        assert_eq!(runs.get(), 1);

        // Unchanged tree: the fast path returns without running anything.
        run_once(Rc::clone(&runs));
        assert_eq!(runs.get(), 1);

        // Touching the config invalidates the fingerprint.
        fs::write(cfg.join("sections.yaml"), "other:\n  extensions: [\".rs\"]\n").unwrap();
        run_once(Rc::clone(&runs));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn failure_records_last_error_and_blocks_fast_path() {
        struct Failing;
        impl Migration for Failing {
            fn id(&self) -> u32 {
                2
            }
            fn title(&self) -> &'static str {
                "failing"
            }
            fn run(&self, _cfg_fs: &CfgFs, _allow: bool) -> Result<bool, MigrationError> {
                Err(MigrationError::fatal(2, "failing", "boom"))
            }
        }

        let (tmp, cfg) = setup();
        let cache = Cache::new(tmp.path(), Some(true), false, "t1");
        let runner =
            MigrationRunner::new(&cache, "t1").with_migrations(vec![Box::new(Failing)]);

        let err = runner.ensure_current(&cfg).unwrap_err();
        assert!(matches!(err, MigrationError::Fatal { id: 2, .. }));

        let state: MigrationState = cache.get_cfg_state(&cfg).unwrap();
        let last = state.last_error.unwrap();
        assert_eq!(last.failed_id, 2);
        assert_eq!(last.phase, "run");
        // `actual` never moves past a failed migration.
        assert_eq!(state.actual, 0);
    }

    #[test]
    fn preflight_failure_recorded_with_phase() {
        struct NeedsGit;
        impl Migration for NeedsGit {
            fn id(&self) -> u32 {
                3
            }
            fn title(&self) -> &'static str {
                "needs git"
            }
            fn run(&self, _cfg_fs: &CfgFs, allow: bool) -> Result<bool, MigrationError> {
                if !allow {
                    return Err(MigrationError::PreflightRequired {
                        id: 3,
                        title: "needs git".into(),
                    });
                }
                Ok(true)
            }
        }

        let (tmp, cfg) = setup();
        let cache = Cache::new(tmp.path(), Some(true), false, "t1");
        let runner =
            MigrationRunner::new(&cache, "t1").with_migrations(vec![Box::new(NeedsGit)]);

        // No .git directory and no env override: preflight fails.
        let err = runner.ensure_current(&cfg).unwrap_err();
        assert!(matches!(err, MigrationError::PreflightRequired { .. }));

        let state: MigrationState = cache.get_cfg_state(&cfg).unwrap();
        assert_eq!(state.last_error.unwrap().phase, "preflight");
    }

    #[test]
    fn format_too_new_is_fatal() {
        let (tmp, cfg) = setup();
        let cache = Cache::new(tmp.path(), Some(true), false, "t1");
        cache.put_cfg_state(
            &cfg,
            &MigrationState {
                actual: CFG_CURRENT + 1,
                ..MigrationState::default()
            },
        );
        let runner = MigrationRunner::new(&cache, "t1");
        let err = runner.ensure_current(&cfg).unwrap_err();
        assert!(matches!(err, MigrationError::FormatTooNew { .. }));
    }

    #[test]
    fn full_builtin_run_on_clean_tree() {
        let (tmp, cfg) = setup();
        // Simulate a git checkout so destructive migrations may run.
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let cache = Cache::new(tmp.path(), Some(true), false, "t1");
        let runner = MigrationRunner::new(&cache, "t1");
        runner.ensure_current(&cfg).unwrap();

        let state: MigrationState = cache.get_cfg_state(&cfg).unwrap();
        assert_eq!(state.actual, CFG_CURRENT);
        assert!(state.last_error.is_none());
    }
}

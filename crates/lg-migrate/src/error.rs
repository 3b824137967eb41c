//! Migration error types.

use thiserror::Error;

/// Errors raised while bringing `lg-cfg/` up to the current format.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration failed; the message is user-facing and hint-bearing.
    #[error("migration #{id} \"{title}\" failed: {message}")]
    Fatal {
        /// Id of the failed migration.
        id: u32,
        /// Title of the failed migration.
        title: String,
        /// What went wrong, with recovery hints.
        message: String,
    },

    /// A migration needs a backup (a Git checkout) before it may run.
    #[error(
        "migration #{id} \"{title}\" needs a Git backup before it can run; \
         commit lg-cfg/ to Git first, or set LG_MIGRATE_ALLOW_NO_GIT=1 to proceed without one"
    )]
    PreflightRequired {
        /// Id of the migration requiring preflight.
        id: u32,
        /// Title of the migration requiring preflight.
        title: String,
    },

    /// Timed out waiting for another process to finish migrating.
    #[error("timeout waiting for migration lock after {waited_secs}s")]
    Timeout {
        /// How long this process waited.
        waited_secs: u64,
    },

    /// The stored config format is newer than this tool supports.
    #[error(
        "configuration format ({stored}) is newer than this tool supports (up to {supported}); \
         please upgrade lg"
    )]
    FormatTooNew {
        /// Format level recorded in the cache.
        stored: u32,
        /// Highest level this build supports.
        supported: u32,
    },
}

impl MigrationError {
    /// Wraps an arbitrary failure of a specific migration.
    pub fn fatal(id: u32, title: &str, message: impl Into<String>) -> Self {
        Self::Fatal {
            id,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

//! The engine's user-error umbrella.

use std::path::PathBuf;

use thiserror::Error;

/// Every user-facing failure the engine can produce.
///
/// The CLI prints these as `Error: <message>` and exits non-zero;
/// programming bugs stay panics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The working directory is not inside a repository (no `lg-cfg/`).
    #[error("no lg-cfg/ directory found in {start} or any parent")]
    NoRepository {
        /// Where the search started.
        start: PathBuf,
    },

    /// The requested context does not exist.
    #[error("context template not found: {path}")]
    ContextNotFound {
        /// The path that was tried.
        path: PathBuf,
    },

    /// Template parsing or expansion failed.
    #[error(transparent)]
    Template(#[from] lg_template::TemplateError),

    /// Adaptive resolution or validation failed.
    #[error(transparent)]
    Adaptive(#[from] lg_adaptive::AdaptiveError),

    /// Section configuration lookup failed.
    #[error(transparent)]
    Config(#[from] lg_config::ConfigError),

    /// Reference parsing or scope resolution failed.
    #[error(transparent)]
    Addressing(#[from] lg_address::AddressingError),

    /// Condition syntax error.
    #[error(transparent)]
    Condition(#[from] lg_cond::ConditionParseError),

    /// Migrations failed or timed out.
    #[error(transparent)]
    Migration(#[from] lg_migrate::MigrationError),

    /// A filter pattern could not be compiled.
    #[error("invalid filter pattern: {message}")]
    Pattern {
        /// The compilation failure.
        message: String,
    },
}

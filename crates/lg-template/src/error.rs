//! Template error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing or expanding templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template or context file does not exist.
    #[error("template file not found: {path}")]
    NotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// Invalid template syntax.
    #[error("template parse error in {name}: {message}")]
    Parse {
        /// The template being parsed.
        name: String,
        /// What is wrong.
        message: String,
    },

    /// Circular template/context includes.
    #[error("template cycle detected: {}", chain.join(" -> "))]
    Cycle {
        /// The include chain, ending at the repeated entry.
        chain: Vec<String>,
    },

    /// A failure while expanding a template.
    #[error("failed to process template '{name}': {message}")]
    Processing {
        /// The template being expanded.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// Invalid condition syntax inside `{% if %}`.
    #[error(transparent)]
    Condition(#[from] lg_cond::ConditionParseError),

    /// Addressing failure while resolving an include.
    #[error(transparent)]
    Addressing(#[from] lg_address::AddressingError),

    /// Adaptive failure (unknown mode reference, …).
    #[error(transparent)]
    Adaptive(#[from] lg_adaptive::AdaptiveError),

    /// Section lookup failure.
    #[error(transparent)]
    Config(#[from] lg_config::ConfigError),
}

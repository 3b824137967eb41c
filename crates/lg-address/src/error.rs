//! Addressing error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing or resolving resource references.
#[derive(Debug, Error)]
pub enum AddressingError {
    /// The reference text is malformed.
    #[error("invalid reference '{reference}': {message}")]
    InvalidReference {
        /// The reference as written.
        reference: String,
        /// What is wrong with it.
        message: String,
    },

    /// The referenced scope has no `lg-cfg/` directory (or does not exist).
    #[error("scope '{origin}' resolved to {scope_dir}, which is not a scope")]
    ScopeNotFound {
        /// The origin as written in the reference.
        origin: String,
        /// Where it resolved to.
        scope_dir: PathBuf,
    },

    /// The resolved path left the scope that was claimed to contain it.
    #[error("path '{path}' escapes scope {scope_dir}")]
    PathEscapesScope {
        /// The offending resource path.
        path: String,
        /// The scope it was supposed to stay inside.
        scope_dir: PathBuf,
    },

    /// Section lookup or loading failed in the target scope.
    #[error(transparent)]
    Config(#[from] lg_config::ConfigError),
}

//! Error types for section configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or resolving section configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A configuration file is not valid YAML.
    #[error("failed to parse {path}: {source}")]
    ParseYaml {
        /// The unparseable file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A configuration file's top level is not a mapping.
    #[error("{path}: top level must be a mapping of section names")]
    NotAMapping {
        /// The offending file.
        path: PathBuf,
    },

    /// A section definition has an invalid shape.
    #[error("section '{section}' in {path}: {message}")]
    InvalidSection {
        /// Section name.
        section: String,
        /// File the section came from.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },

    /// No section with the requested name exists in the scope.
    #[error("section '{name}' not found; searched keys: {}", searched.join(", "))]
    SectionNotFound {
        /// The reference as written.
        name: String,
        /// Index keys that were tried, in order.
        searched: Vec<String>,
    },

    /// The target directory is not a scope (no `lg-cfg/`).
    #[error("no lg-cfg/ directory in {scope_dir}")]
    ScopeNotFound {
        /// The directory that was expected to be a scope.
        scope_dir: PathBuf,
    },

    /// Migrations could not bring the configuration to the current format.
    #[error(transparent)]
    Migration(#[from] lg_migrate::MigrationError),
}

//! Section configuration for lg.
//!
//! Sections are declared in YAML files inside each scope's `lg-cfg/`
//! directory: `sections.yaml` plus any number of `*.sec.yaml` files,
//! recursively. A section groups an extension set, a filter tree, adapter
//! options, and adaptive metadata (mode-sets/tag-sets) under one name.
//!
//! This crate owns the configuration data model, the per-scope section
//! index (with mtime invalidation and an on-disk cache), and the
//! [`SectionStore`] service that the rest of the engine goes through.

#![warn(missing_docs)]

mod error;
mod index;
mod model;
mod store;
mod value;

pub use error::ConfigError;
pub use index::{ScopeIndex, SectionLocation, build_index, iter_config_files};
pub use model::{
    AdapterConfig, ConditionalFilter, ConditionalOptions, EmptyPolicy, FilterMode, FilterNode,
    Options, PathLabelMode, SectionConfig, TargetRule,
};
pub use store::SectionStore;
pub use value::yaml_to_json;

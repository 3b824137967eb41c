//! The lg engine: everything between a target name and the final prompt.
//!
//! Data flow for a render:
//!
//! ```text
//! target → template engine → (addressing + section store + adaptive)
//!        → manifest (filters, VCS) → planner → adapter pipeline
//!        → renderer → template splice → stats → output
//! ```
//!
//! The CLI crate is a thin shell over [`Engine`].

#![warn(missing_docs)]

mod context;
mod engine;
mod error;
mod labels;
mod listing;
mod options;
mod planner;
mod renderer;
mod section;

pub use context::ContextResolver;
pub use engine::{Engine, RenderOutcome, TargetKind, TargetSpec, parse_target};
pub use error::EngineError;
pub use labels::build_labels;
pub use listing::{
    ContextsList, ModeSetsList, SectionsList, TagSetsList, list_contexts, list_contexts_for_provider,
    list_mode_sets, list_sections, list_tag_sets,
};
pub use options::RunOptions;
pub use planner::{PlanGroup, SectionPlan, build_plan};
pub use renderer::{render_file_marker, render_section_text};
pub use section::SectionProcessor;

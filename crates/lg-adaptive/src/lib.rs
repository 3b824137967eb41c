//! The adaptive model: modes, tags, and section inheritance.
//!
//! Sections declare *mode-sets* (named families of mutually exclusive
//! modes) and *tag-sets* (groups of filtering tags). Contexts aggregate the
//! adaptive data of every section they touch; the merged model drives
//! conditional filters, conditional adapter options, and template blocks.
//!
//! A mode-set whose modes declare provider `runs` commands is an
//! *integration* mode-set; exactly one must exist per context.

#![warn(missing_docs)]

mod error;
mod extends;
mod extract;
mod model;
mod provider;
mod validate;

pub use error::AdaptiveError;
pub use extends::{ExtendsResolver, ResolvedSectionData};
pub use extract::extract_adaptive_model;
pub use model::{AdaptiveModel, Mode, ModeSet, Tag, TagSet};
pub use provider::{CLIPBOARD_PROVIDER, normalize_provider_id};
pub use validate::{validate_mode_reference, validate_model, validate_provider_support};

//! Resource addressing for lg.
//!
//! Template placeholders refer to sections, sub-templates, contexts, and
//! markdown files by *references* that may cross scope boundaries:
//!
//! ```text
//! name                local, relative to the current directory in lg-cfg/
//! /name               local, relative to the scope's lg-cfg/ root
//! @scope:name         scope is a path relative to the current scope dir
//! @[scope]:name       bracketed form for scopes containing ':'
//! @:name  @/:name     the repository root scope
//! ```
//!
//! Parsing and resolution are split: [`parse`] turns a reference into a
//! [`ParsedPath`] according to a [`ResourceConfig`]; [`resolve_file`] and
//! [`SectionResolver`] turn parsed paths into absolute locations, enforcing
//! scope-boundary checks.

#![warn(missing_docs)]

mod context;
mod error;
mod parse;
mod resolve;
mod section;

pub use context::{AddressingContext, DirectoryContext};
pub use error::AddressingError;
pub use parse::{ParsedPath, ResourceConfig, parse};
pub use resolve::{ResolvedFile, resolve_file, resolve_origin};
pub use section::{ResolvedSection, SectionResolver};

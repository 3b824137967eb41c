//! Section-reference resolution.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use lg_config::{SectionConfig, SectionLocation, SectionStore};
use lg_path::rel_posix;

use crate::context::AddressingContext;
use crate::error::AddressingError;
use crate::parse::{ResourceConfig, parse};
use crate::resolve::resolve_origin;

/// The full result of resolving a section reference.
///
/// Carries the scope that determines later `extends` lookups, so adaptive
/// resolution never re-derives it (and cannot get it wrong).
#[derive(Debug, Clone)]
pub struct ResolvedSection {
    /// Scope directory owning the section.
    pub scope_dir: PathBuf,
    /// Scope path relative to the repository root ("" for the root).
    pub scope_rel: String,
    /// Physical location of the definition.
    pub location: SectionLocation,
    /// The loaded configuration.
    pub config: Rc<SectionConfig>,
    /// The reference as written in the template (for diagnostics).
    pub name: String,
    /// The canonical index key the reference resolved to.
    pub canonical: String,
    /// Directory context the reference was resolved in (drives relative
    /// `extends` lookups).
    pub current_dir: String,
}

impl ResolvedSection {
    /// Canonical identity of the section across scopes:
    /// `@<scope_rel>:<key>`, with the root scope's prefix omitted.
    pub fn canon_key(&self) -> String {
        if self.scope_rel.is_empty() {
            self.canonical.clone()
        } else {
            format!("@{}:{}", self.scope_rel, self.canonical)
        }
    }
}

/// Resolves section references against a [`SectionStore`].
pub struct SectionResolver<'a> {
    /// The store used for index lookups and config loading.
    store: &'a SectionStore,
}

impl<'a> SectionResolver<'a> {
    /// Creates a resolver over a store.
    pub fn new(store: &'a SectionStore) -> Self {
        Self { store }
    }

    /// Resolves a section reference (simple or addressed) in the current
    /// addressing context.
    pub fn resolve(
        &self,
        reference: &str,
        ctx: &AddressingContext,
    ) -> Result<ResolvedSection, AddressingError> {
        let parsed = parse(reference, &ResourceConfig::section())?;
        let frame = ctx.current();

        let (scope_dir, scope_rel, current_dir) = match &parsed.origin {
            Some(origin) => {
                let (scope_dir, scope_rel) = resolve_origin(origin, ctx)?;
                // Addressed references resolve at the target scope's root.
                (scope_dir, scope_rel, String::new())
            }
            None => {
                let scope_dir = frame
                    .cfg_root
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| ctx.repo_root().to_path_buf());
                let scope_rel = rel_posix(&scope_dir, ctx.repo_root()).unwrap_or_default();
                (scope_dir, scope_rel, frame.current_dir.clone())
            }
        };

        // Re-assemble the in-scope reference (keep the absolute marker).
        let local_ref = if parsed.is_absolute {
            format!("/{}", parsed.path)
        } else {
            parsed.path.clone()
        };

        let (canonical, location) = self
            .store
            .find_section(&local_ref, &current_dir, &scope_dir)?;
        let config = self.store.load_section(&location)?;

        Ok(ResolvedSection {
            scope_dir,
            scope_rel,
            location,
            config,
            name: reference.to_string(),
            canonical,
            current_dir,
        })
    }
}

//! Context-level adaptive resolution.
//!
//! Builds the merged adaptive model of a context: collect every section it
//! touches (frontmatter includes first, then body sections in order of
//! first appearance; conditions are not evaluated), resolve each
//! section's extends chain, and fold the models together in traversal
//! order.

use lg_address::{AddressingContext, ResolvedSection, SectionResolver};
use lg_adaptive::{AdaptiveModel, ExtendsResolver};
use lg_config::SectionStore;
use lg_template::{CollectedSections, SectionCollector};

use crate::error::EngineError;

/// Resolves merged adaptive models for contexts and standalone sections.
pub struct ContextResolver<'a> {
    /// Section lookup.
    store: &'a SectionStore,
    /// Directory-context stack.
    addressing: &'a AddressingContext,
    /// Shared extends resolver (cache lives for the run).
    extends: &'a ExtendsResolver<'a>,
}

impl<'a> ContextResolver<'a> {
    /// Creates a resolver over the run's services.
    pub fn new(
        store: &'a SectionStore,
        addressing: &'a AddressingContext,
        extends: &'a ExtendsResolver<'a>,
    ) -> Self {
        Self {
            store,
            addressing,
            extends,
        }
    }

    /// Collects a context's sections and merges their adaptive data.
    pub fn resolve_for_context(
        &self,
        context_name: &str,
    ) -> Result<(AdaptiveModel, CollectedSections), EngineError> {
        let collector = SectionCollector::new(self.store, self.addressing);
        let collected = collector.collect(context_name)?;

        let mut merged = AdaptiveModel::default();
        for section in &collected.sections {
            let data = self.extends.resolve_from_resolved(section)?;
            merged = merged.merge_with(&data.adaptive_model);
        }
        Ok((merged, collected))
    }

    /// Resolves the adaptive model of one section (its extends chain only).
    pub fn resolve_for_section(
        &self,
        reference: &str,
    ) -> Result<(AdaptiveModel, ResolvedSection), EngineError> {
        let resolver = SectionResolver::new(self.store);
        let resolved = resolver.resolve(reference, self.addressing)?;
        let data = self.extends.resolve_from_resolved(&resolved)?;
        Ok((data.adaptive_model.clone(), resolved))
    }
}

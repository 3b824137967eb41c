//! The section processor.
//!
//! Drives one section placeholder end to end: resolve, fold extends, build
//! the manifest, plan, run the adapter pipeline, render, and feed the
//! stats collector.

use std::cell::RefCell;

use lg_adapter::{AdapterRegistry, GroupInfo, Pipeline, ProcessedFile};
use lg_adaptive::{AdaptiveError, AdaptiveModel, ExtendsResolver};
use lg_address::{AddressingContext, SectionResolver};
use lg_cache::Cache;
use lg_config::SectionStore;
use lg_filter::{ManifestParams, build_manifest};
use lg_stats::{StatsCollector, TokenService};
use lg_template::{ActiveState, SectionHandler, TemplateError};
use lg_vcs::VcsProvider;

use crate::error::EngineError;
use crate::planner::build_plan;
use crate::renderer::render_section_text;

/// Section renderer for one run.
pub struct SectionProcessor<'a> {
    /// Section lookup.
    pub store: &'a SectionStore,
    /// Shared extends resolver.
    pub extends: &'a ExtendsResolver<'a>,
    /// Directory-context stack.
    pub addressing: &'a AddressingContext,
    /// The merged adaptive model conditions evaluate against.
    pub model: &'a AdaptiveModel,
    /// Change-set provider.
    pub vcs: &'a dyn VcsProvider,
    /// Adapter table.
    pub registry: &'a AdapterRegistry,
    /// Blob/token cache.
    pub cache: &'a Cache,
    /// Token service for stats.
    pub tokens: &'a TokenService,
    /// The run's stats collector.
    pub stats: &'a RefCell<StatsCollector>,
    /// Normalised provider base id.
    pub provider_base: Option<String>,
    /// Target branch for branch-changes mode.
    pub target_branch: Option<String>,
    /// Global code-fence switch.
    pub code_fence_global: bool,
}

impl SectionProcessor<'_> {
    /// Renders one section under the given state.
    pub fn render(&self, reference: &str, state: &ActiveState) -> Result<String, EngineError> {
        let resolver = SectionResolver::new(self.store);
        let resolved = resolver.resolve(reference, self.addressing)?;

        if resolved.config.is_meta() {
            return Err(EngineError::Adaptive(AdaptiveError::MetaSectionRender {
                name: resolved.name.clone(),
            }));
        }

        let data = self.extends.resolve_from_resolved(&resolved)?;
        let section_config = data
            .original
            .as_ref()
            .expect("resolved data always carries the concrete config");
        let filters = section_config
            .filters
            .as_ref()
            .expect("non-meta sections always have filters");

        let conditions = state.condition_context(self.model, self.provider_base.as_deref());

        let namer = |path: &std::path::Path| self.registry.adapter_name_for_path(path);
        let manifest = build_manifest(&ManifestParams {
            repo_root: self.store.root(),
            scope_rel: &resolved.scope_rel,
            filters,
            extensions: &data.extensions,
            adapters: &data.adapters,
            targets: &data.targets,
            skip_empty: data.skip_empty,
            path_labels: data.path_labels,
            conditions: &conditions,
            vcs: self.vcs,
            vcs_mode: state.vcs_mode,
            target_branch: self.target_branch.as_deref(),
            adapter_namer: &namer,
        })
        .map_err(|err| EngineError::Pattern {
            message: err.to_string(),
        })?;

        let plan = build_plan(
            &manifest,
            self.code_fence_global && data.code_fence,
            &state.origin,
        );

        let pipeline = Pipeline::new(
            self.registry,
            self.cache,
            &conditions,
            state.active_tags.iter().cloned(),
        );

        let canon_key = resolved.canon_key();
        let mut processed: Vec<ProcessedFile> = Vec::new();
        for group in &plan.groups {
            let info = GroupInfo {
                size: group.entries.len(),
                mixed: group.mixed,
                lang: group.lang.clone(),
            };
            for entry in &group.entries {
                if let Some(file) =
                    pipeline.process_file(entry, &manifest.adapters_cfg, &info, &canon_key)
                {
                    self.stats
                        .borrow_mut()
                        .register_processed_file(&file, self.tokens);
                    processed.push(file);
                }
            }
        }

        let text = render_section_text(&plan, &processed);
        self.stats.borrow_mut().register_section_rendered(
            &canon_key,
            &text,
            &processed,
            self.tokens,
        );
        Ok(text)
    }
}

impl SectionHandler for SectionProcessor<'_> {
    fn render_section(
        &self,
        reference: &str,
        state: &ActiveState,
    ) -> Result<String, TemplateError> {
        self.render(reference, state)
            .map_err(|err| to_template_error(err, reference))
    }
}

/// Maps engine errors back into the template error space, preserving the
/// typed variants callers match on.
fn to_template_error(err: EngineError, reference: &str) -> TemplateError {
    match err {
        EngineError::Template(inner) => inner,
        EngineError::Adaptive(inner) => TemplateError::Adaptive(inner),
        EngineError::Config(inner) => TemplateError::Config(inner),
        EngineError::Addressing(inner) => TemplateError::Addressing(inner),
        EngineError::Condition(inner) => TemplateError::Condition(inner),
        other => TemplateError::Processing {
            name: reference.to_string(),
            message: other.to_string(),
        },
    }
}

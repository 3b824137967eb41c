//! The engine: target parsing and run orchestration.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use lg_adapter::AdapterRegistry;
use lg_adaptive::{
    AdaptiveError, AdaptiveModel, ExtendsResolver, normalize_provider_id, validate_model,
    validate_provider_support,
};
use lg_address::AddressingContext;
use lg_cache::Cache;
use lg_config::SectionStore;
use lg_stats::{
    HeuristicCounter, Report, Scope, StatsCollector, TokenService, build_report,
};
use lg_template::{ActiveState, TemplateEngine};
use lg_vcs::{GitVcs, NullVcs, VcsMode, VcsProvider};

use crate::context::ContextResolver;
use crate::error::EngineError;
use crate::options::RunOptions;
use crate::section::SectionProcessor;

/// The tool version baked into cache keys and migration state.
pub(crate) const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kind of render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A context template (`<name>.ctx.md`).
    Context,
    /// A single section.
    Section,
}

/// A parsed render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Context or section.
    pub kind: TargetKind,
    /// Bare name (no `ctx:`/`sec:` prefix).
    pub name: String,
}

/// Parses a target string.
///
/// `ctx:name` and `sec:name` force the kind; a bare name is a context when
/// `<name>.ctx.md` exists, otherwise a section. A forced context that does
/// not exist is an error.
pub fn parse_target(root: &Path, target: &str) -> Result<TargetSpec, EngineError> {
    let target = target.trim();

    let (kind, name) = if let Some(name) = target.strip_prefix("ctx:") {
        (Some(TargetKind::Context), name)
    } else if let Some(name) = target.strip_prefix("sec:") {
        (Some(TargetKind::Section), name)
    } else {
        (None, target)
    };

    let context_path = lg_path::cfg_root(root).join(format!("{name}.ctx.md"));
    match kind {
        Some(TargetKind::Context) => {
            if !context_path.is_file() {
                return Err(EngineError::ContextNotFound { path: context_path });
            }
            Ok(TargetSpec {
                kind: TargetKind::Context,
                name: name.to_string(),
            })
        }
        Some(TargetKind::Section) => Ok(TargetSpec {
            kind: TargetKind::Section,
            name: name.to_string(),
        }),
        None => Ok(TargetSpec {
            kind: if context_path.is_file() {
                TargetKind::Context
            } else {
                TargetKind::Section
            },
            name: name.to_string(),
        }),
    }
}

/// The result of one render: the prompt text and its accounting report.
#[derive(Debug)]
pub struct RenderOutcome {
    /// The final prompt text.
    pub text: String,
    /// The token-accounting report.
    pub report: Report,
}

/// One configured engine instance.
pub struct Engine {
    /// Repository root.
    root: PathBuf,
    /// Run options.
    options: RunOptions,
    /// Shared cache.
    cache: Rc<Cache>,
    /// Section store.
    store: SectionStore,
    /// Adapter table.
    registry: AdapterRegistry,
    /// Change-set provider.
    vcs: Box<dyn VcsProvider>,
    /// Token service.
    tokens: TokenService,
}

impl Engine {
    /// Creates an engine rooted at a repository.
    pub fn new(root: &Path, options: RunOptions) -> Self {
        let cache = Rc::new(Cache::new(root, None, options.fresh, TOOL_VERSION));
        let store = SectionStore::new(root, Rc::clone(&cache), TOOL_VERSION);
        let vcs: Box<dyn VcsProvider> = if GitVcs::available(root) {
            Box::new(GitVcs)
        } else {
            Box::new(NullVcs)
        };
        let tokens = TokenService::new(
            Box::new(HeuristicCounter),
            options.model.clone(),
            Rc::clone(&cache),
        );
        Self {
            root: root.to_path_buf(),
            options,
            cache,
            store,
            registry: AdapterRegistry::builtin(),
            vcs,
            tokens,
        }
    }

    /// The repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Renders a target and produces its report.
    pub fn render(&self, target: &str) -> Result<RenderOutcome, EngineError> {
        let spec = parse_target(&self.root, target)?;
        match spec.kind {
            TargetKind::Context => self.render_context(&spec.name),
            TargetKind::Section => self.render_section(&spec.name),
        }
    }

    fn provider_base(&self) -> Option<String> {
        self.options
            .provider
            .as_deref()
            .map(|full| normalize_provider_id(full).to_string())
    }

    /// Validates the merged model and builds the run's base state.
    ///
    /// Adaptive validation only applies when the model declares mode-sets:
    /// a repository without adaptive configuration renders plainly.
    fn prepare_state(&self, model: &AdaptiveModel, context: &str) -> Result<ActiveState, EngineError> {
        if !model.mode_sets.is_empty() {
            validate_model(model, context)?;
            if let Some(provider) = self.options.provider.as_deref() {
                validate_provider_support(model, provider, context)?;
            }
        }

        let mut tags = self.options.extra_tags.clone();
        let mut modes = BTreeMap::new();
        let mut vcs_mode = self.options.vcs_mode;
        let mut allow_tools = false;

        for (set_id, mode_id) in &self.options.modes {
            let Some(set) = model.mode_sets.get(set_id) else {
                return Err(EngineError::Adaptive(AdaptiveError::UnknownModeSet {
                    set: set_id.clone(),
                    available: model.mode_sets.keys().cloned().collect(),
                }));
            };
            let Some(mode) = set.modes.get(mode_id) else {
                return Err(EngineError::Adaptive(AdaptiveError::InvalidModeReference {
                    set: set_id.clone(),
                    mode: mode_id.clone(),
                    context: context.to_string(),
                    available: set.modes.keys().cloned().collect(),
                }));
            };
            modes.insert(set_id.clone(), mode_id.clone());
            tags.extend(mode.tags.iter().cloned());
            // An explicit --vcs wins over mode-declared modes.
            if vcs_mode.is_none() {
                vcs_mode = mode.vcs_mode;
            }
            if let Some(allowed) = mode.allow_tools {
                allow_tools = allowed;
            }
        }

        let mut state = ActiveState::new(modes, tags, vcs_mode.unwrap_or(VcsMode::All));
        state.allow_tools = allow_tools;
        Ok(state)
    }

    fn render_context(&self, name: &str) -> Result<RenderOutcome, EngineError> {
        let addressing = AddressingContext::new(&self.root);
        let extends = ExtendsResolver::new(&self.store);
        let resolver = ContextResolver::new(&self.store, &addressing, &extends);

        let (model, _collected) = resolver.resolve_for_context(name)?;
        let state = self.prepare_state(&model, name)?;

        let stats = RefCell::new(StatsCollector::new());
        stats.borrow_mut().set_target(&format!("ctx:{name}"));

        let processor = SectionProcessor {
            store: &self.store,
            extends: &extends,
            addressing: &addressing,
            model: &model,
            vcs: self.vcs.as_ref(),
            registry: &self.registry,
            cache: &self.cache,
            tokens: &self.tokens,
            stats: &stats,
            provider_base: self.provider_base(),
            target_branch: self.options.target_branch.clone(),
            code_fence_global: self.options.code_fence,
        };

        let engine = TemplateEngine::new(
            &addressing,
            &model,
            &processor,
            self.provider_base(),
            state,
        );
        let expansion = engine.expand_context(name)?;
        let text = finalize_document(&expansion.final_text);

        stats.borrow_mut().set_final_text(&text);
        let report = build_report(&stats.borrow(), &self.tokens, Scope::Context, name);

        Ok(RenderOutcome { text, report })
    }

    fn render_section(&self, name: &str) -> Result<RenderOutcome, EngineError> {
        let addressing = AddressingContext::new(&self.root);
        let extends = ExtendsResolver::new(&self.store);
        let resolver = ContextResolver::new(&self.store, &addressing, &extends);

        let (model, _resolved) = resolver.resolve_for_section(name)?;
        let state = self.prepare_state(&model, name)?;

        let stats = RefCell::new(StatsCollector::new());
        stats.borrow_mut().set_target(&format!("sec:{name}"));

        let processor = SectionProcessor {
            store: &self.store,
            extends: &extends,
            addressing: &addressing,
            model: &model,
            vcs: self.vcs.as_ref(),
            registry: &self.registry,
            cache: &self.cache,
            tokens: &self.tokens,
            stats: &stats,
            provider_base: self.provider_base(),
            target_branch: self.options.target_branch.clone(),
            code_fence_global: self.options.code_fence,
        };

        let text = finalize_document(&processor.render(name, &state)?);
        stats.borrow_mut().set_final_text(&text);
        let report = build_report(&stats.borrow(), &self.tokens, Scope::Section, name);

        Ok(RenderOutcome { text, report })
    }
}

/// Final-document discipline: trailing whitespace trimmed, exactly one
/// newline at the end unless the document is empty.
fn finalize_document(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

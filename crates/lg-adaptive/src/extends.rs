//! Section inheritance resolution.
//!
//! Resolves a section's `extends` chain depth-first, left-to-right, with a
//! per-resolver stack for cycle detection and a cache keyed by canonical
//! section identity. Cross-scope parents resolve in *their own* scope, so a
//! child scope's `extends: ["tags"]` binds to the child's meta-section even
//! when the root defines one with the same name.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use lg_address::ResolvedSection;
use lg_config::{
    AdapterConfig, ConditionalOptions, PathLabelMode, SectionConfig, SectionStore, TargetRule,
};
use lg_path::rel_posix;

use crate::error::AdaptiveError;
use crate::extract::extract_adaptive_model;
use crate::model::AdaptiveModel;

/// A section with its whole `extends` chain folded in.
#[derive(Debug, Clone)]
pub struct ResolvedSectionData {
    /// Merged adaptive model.
    pub adaptive_model: AdaptiveModel,
    /// Merged extensions, first-seen order.
    pub extensions: Vec<String>,
    /// Deep-merged adapter configurations.
    pub adapters: BTreeMap<String, AdapterConfig>,
    /// Per-path override rules (child wins, no concatenation).
    pub targets: Vec<TargetRule>,
    /// Effective empty-file policy.
    pub skip_empty: bool,
    /// Effective label mode.
    pub path_labels: PathLabelMode,
    /// Effective fencing policy.
    pub code_fence: bool,
    /// The concrete section's own config (filters live only here).
    pub original: Option<Rc<SectionConfig>>,
}

impl ResolvedSectionData {
    fn empty() -> Self {
        Self {
            adaptive_model: AdaptiveModel::default(),
            extensions: Vec::new(),
            adapters: BTreeMap::new(),
            targets: Vec::new(),
            skip_empty: true,
            path_labels: PathLabelMode::ScopeRelative,
            code_fence: true,
            original: None,
        }
    }
}

/// Resolver for `extends` chains.
pub struct ExtendsResolver<'a> {
    /// Section lookup and loading.
    store: &'a SectionStore,
    /// Active resolution stack (canonical keys) for cycle detection.
    stack: RefCell<Vec<String>>,
    /// Cache keyed by canonical section identity.
    cache: RefCell<HashMap<String, Rc<ResolvedSectionData>>>,
}

impl<'a> ExtendsResolver<'a> {
    /// Creates a resolver over a section store.
    pub fn new(store: &'a SectionStore) -> Self {
        Self {
            store,
            stack: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolves a section (by reference) with all extends applied.
    pub fn resolve(
        &self,
        reference: &str,
        scope_dir: &Path,
        current_dir: &str,
    ) -> Result<Rc<ResolvedSectionData>, AdaptiveError> {
        if reference.starts_with('@') {
            return self.resolve_addressed(reference, scope_dir);
        }

        let cache_key = format!("{}:{}", scope_dir.display(), reference);
        if let Some(data) = self.cache.borrow().get(&cache_key) {
            return Ok(Rc::clone(data));
        }
        self.check_cycle(&cache_key)?;

        let (_, location) = self
            .store
            .find_section(reference, current_dir, scope_dir)
            .map_err(|err| self.not_found(reference, err))?;
        let config = self.store.load_section(&location)?;

        self.resolve_from_config(&config, &cache_key, scope_dir, current_dir)
    }

    /// Resolves starting from an already loaded config.
    ///
    /// `cache_key` must be a canonical identity for the section (callers
    /// pass the canon key of a [`ResolvedSection`]).
    pub fn resolve_from_config(
        &self,
        config: &Rc<SectionConfig>,
        cache_key: &str,
        scope_dir: &Path,
        current_dir: &str,
    ) -> Result<Rc<ResolvedSectionData>, AdaptiveError> {
        if let Some(data) = self.cache.borrow().get(cache_key) {
            return Ok(Rc::clone(data));
        }
        self.check_cycle(cache_key)?;

        self.stack.borrow_mut().push(cache_key.to_string());
        let result = self.fold_extends(config, scope_dir, current_dir);
        self.stack.borrow_mut().pop();

        let mut data = result?;
        data.original = Some(Rc::clone(config));
        let data = Rc::new(data);
        self.cache
            .borrow_mut()
            .insert(cache_key.to_string(), Rc::clone(&data));
        Ok(data)
    }

    /// Resolves a fully resolved section reference.
    pub fn resolve_from_resolved(
        &self,
        resolved: &ResolvedSection,
    ) -> Result<Rc<ResolvedSectionData>, AdaptiveError> {
        self.resolve_from_config(
            &resolved.config,
            &resolved.canon_key(),
            &resolved.scope_dir,
            &resolved.current_dir,
        )
    }

    /// Drops all cached resolutions.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    fn fold_extends(
        &self,
        config: &Rc<SectionConfig>,
        scope_dir: &Path,
        current_dir: &str,
    ) -> Result<ResolvedSectionData, AdaptiveError> {
        let mut base = ResolvedSectionData::empty();
        for parent_ref in &config.extends {
            let parent = self.resolve(parent_ref, scope_dir, current_dir)?;
            base = merge(&base, &parent);
        }
        let own = extract_data(config)?;
        Ok(merge(&base, &own))
    }

    fn resolve_addressed(
        &self,
        reference: &str,
        current_scope: &Path,
    ) -> Result<Rc<ResolvedSectionData>, AdaptiveError> {
        let (origin, name) = split_addressed(reference).ok_or_else(|| {
            AdaptiveError::SectionNotFoundInExtends {
                name: reference.to_string(),
                parent: self.stack.borrow().last().cloned().unwrap_or_default(),
            }
        })?;

        // An empty origin is the repository root; otherwise the origin is a
        // path relative to the current scope directory.
        let target_scope = if origin.is_empty() {
            self.store.root().to_path_buf()
        } else {
            normalize(&current_scope.join(origin))
        };
        // The canonical key is scope-relative so all spellings of the same
        // target share cache entries.
        let scope_rel = rel_posix(&target_scope, self.store.root()).unwrap_or_default();
        let canon = if scope_rel.is_empty() {
            name.to_string()
        } else {
            format!("@{scope_rel}:{name}")
        };

        if let Some(data) = self.cache.borrow().get(&canon) {
            return Ok(Rc::clone(data));
        }
        self.check_cycle(&canon)?;

        let (_, location) = self
            .store
            .find_section(name, "", &target_scope)
            .map_err(|err| self.not_found(reference, err))?;
        let config = self.store.load_section(&location)?;
        // Subsequent parents of this section resolve in *its* scope.
        self.resolve_from_config(&config, &canon, &target_scope, "")
    }

    fn check_cycle(&self, key: &str) -> Result<(), AdaptiveError> {
        let stack = self.stack.borrow();
        if let Some(pos) = stack.iter().position(|entry| entry == key) {
            let mut cycle: Vec<String> = stack[pos..].to_vec();
            cycle.push(key.to_string());
            return Err(AdaptiveError::ExtendsCycle { cycle });
        }
        Ok(())
    }

    fn not_found(&self, reference: &str, err: lg_config::ConfigError) -> AdaptiveError {
        match err {
            lg_config::ConfigError::SectionNotFound { .. } => {
                AdaptiveError::SectionNotFoundInExtends {
                    name: reference.to_string(),
                    parent: self.stack.borrow().last().cloned().unwrap_or_default(),
                }
            }
            other => AdaptiveError::Config(other),
        }
    }
}

/// Splits `@scope:name` / `@[scope]:name` into origin and name.
fn split_addressed(reference: &str) -> Option<(&str, &str)> {
    let after_at = reference.strip_prefix('@')?;
    if let Some(bracketed) = after_at.strip_prefix('[') {
        let close = bracketed.find("]:")?;
        Some((&bracketed[..close], &bracketed[close + 2..]))
    } else {
        let (origin, name) = after_at.split_once(':')?;
        let origin = if origin == "/" { "" } else { origin };
        Some((origin, name))
    }
}

/// Lexical path normalisation (`..` collapse without filesystem access).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn extract_data(config: &Rc<SectionConfig>) -> Result<ResolvedSectionData, AdaptiveError> {
    Ok(ResolvedSectionData {
        adaptive_model: extract_adaptive_model(config)?,
        extensions: config.extensions.clone(),
        adapters: config.adapters.clone(),
        targets: config.targets.clone(),
        skip_empty: config.skip_empty,
        path_labels: config.path_labels,
        code_fence: config.code_fence,
        original: Some(Rc::clone(config)),
    })
}

/// Merges two resolved datasets; `over` wins on conflicts.
fn merge(base: &ResolvedSectionData, over: &ResolvedSectionData) -> ResolvedSectionData {
    let mut extensions = base.extensions.clone();
    for ext in &over.extensions {
        if !extensions.contains(ext) {
            extensions.push(ext.clone());
        }
    }

    let mut adapters = base.adapters.clone();
    for (name, over_cfg) in &over.adapters {
        match adapters.get_mut(name) {
            Some(existing) => *existing = merge_adapter(existing, over_cfg),
            None => {
                adapters.insert(name.clone(), over_cfg.clone());
            }
        }
    }

    ResolvedSectionData {
        adaptive_model: base.adaptive_model.merge_with(&over.adaptive_model),
        extensions,
        adapters,
        targets: if over.targets.is_empty() {
            base.targets.clone()
        } else {
            over.targets.clone()
        },
        skip_empty: over.skip_empty,
        path_labels: over.path_labels,
        code_fence: over.code_fence,
        original: None,
    }
}

/// Merges one adapter config: base options child-wins, conditional patches
/// concatenate parent-first (later still wins at evaluation time).
fn merge_adapter(base: &AdapterConfig, over: &AdapterConfig) -> AdapterConfig {
    let mut base_options = base.base_options.clone();
    for (key, value) in &over.base_options {
        base_options.insert(key.clone(), value.clone());
    }
    let mut conditional_options: Vec<ConditionalOptions> = base.conditional_options.clone();
    conditional_options.extend(over.conditional_options.iter().cloned());
    AdapterConfig {
        base_options,
        conditional_options,
    }
}

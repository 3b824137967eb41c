//! Section manifest building.
//!
//! Turns one resolved section plus the active run state into the sorted
//! list of files the section will render, with per-file adapter overrides
//! and the final per-adapter option maps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use lg_cond::{ConditionContext, evaluate_text};
use lg_config::{
    AdapterConfig, ConditionalFilter, EmptyPolicy, FilterNode, Options, PathLabelMode, TargetRule,
};
use lg_path::{rel_posix, strip_prefix_posix};
use lg_vcs::{VcsMode, VcsProvider};

use crate::engine::FilterEngine;
use crate::gitignore::GitignoreMatcher;
use crate::lang::language_for_file;
use crate::walk::walk_files;

/// One file selected into a section.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// POSIX path relative to the repository root.
    pub rel_path: String,
    /// Fence language ("" for markdown/plain text).
    pub language_hint: String,
    /// Adapter name → option patch from matching `targets` rules.
    pub adapter_overrides: BTreeMap<String, Options>,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// The manifest of one section: its files and effective configuration.
#[derive(Debug, Clone)]
pub struct SectionManifest {
    /// Selected files, sorted by `rel_path`.
    pub files: Vec<FileEntry>,
    /// Label mode for rendering.
    pub path_labels: PathLabelMode,
    /// Final adapter options (conditionals already applied).
    pub adapters_cfg: BTreeMap<String, Options>,
    /// Whether every file is markdown/plain text.
    pub is_doc_only: bool,
    /// The VCS mode actually applied (doc-only sections force `all`).
    pub effective_vcs_mode: VcsMode,
    /// Scope path relative to the repository root.
    pub scope_rel: String,
}

/// Inputs for one manifest build.
pub struct ManifestParams<'a> {
    /// Repository root.
    pub repo_root: &'a Path,
    /// Scope of the section, relative to the repo root ("" for the root).
    pub scope_rel: &'a str,
    /// The section's filter tree.
    pub filters: &'a FilterNode,
    /// Lowercase extensions (with dot) the section selects.
    pub extensions: &'a [String],
    /// Merged adapter configurations.
    pub adapters: &'a BTreeMap<String, AdapterConfig>,
    /// Per-path override rules.
    pub targets: &'a [TargetRule],
    /// Section-level empty-file policy.
    pub skip_empty: bool,
    /// Label mode, carried through to the manifest.
    pub path_labels: PathLabelMode,
    /// Condition context of the active run state.
    pub conditions: &'a ConditionContext,
    /// Change-set provider.
    pub vcs: &'a dyn VcsProvider,
    /// Requested VCS mode.
    pub vcs_mode: VcsMode,
    /// Target branch for `branch-changes`.
    pub target_branch: Option<&'a str>,
    /// Maps a file to the adapter that will process it (for empty-file
    /// policy lookups); injected by the pipeline layer.
    pub adapter_namer: &'a dyn Fn(&Path) -> String,
}

/// Builds the manifest for one section.
pub fn build_manifest(params: &ManifestParams<'_>) -> Result<SectionManifest, globset::Error> {
    // Fold active conditional overlays into the tree, then compile once.
    let effective_tree = apply_conditional_filters(params.filters, params.conditions);
    let engine = FilterEngine::compile(&effective_tree)?;

    let adapters_cfg = final_adapter_configs(params.adapters, params.conditions);
    let target_specs = compile_targets(params.targets)?;

    // Preview with every file: needed to classify the section as doc-only
    // before any VCS filtering can hide that fact.
    let preview = collect_files(params, &engine, &adapters_cfg, &target_specs, None);
    let is_doc_only = !preview.is_empty() && preview.iter().all(|f| f.language_hint.is_empty());

    let effective_vcs_mode = if is_doc_only { VcsMode::All } else { params.vcs_mode };

    let files = match effective_vcs_mode {
        VcsMode::All => preview,
        VcsMode::Changes => {
            let changed = params.vcs.changed_files(params.repo_root);
            collect_files(params, &engine, &adapters_cfg, &target_specs, Some(&changed))
        }
        VcsMode::BranchChanges => {
            let changed = params
                .vcs
                .branch_changed_files(params.repo_root, params.target_branch);
            collect_files(params, &engine, &adapters_cfg, &target_specs, Some(&changed))
        }
    };

    Ok(SectionManifest {
        files,
        path_labels: params.path_labels,
        adapters_cfg,
        is_doc_only,
        effective_vcs_mode,
        scope_rel: params.scope_rel.to_string(),
    })
}

/// Applies every overlay whose condition holds, recursively at every node.
///
/// Condition failures (parse or reference errors) are logged and treated as
/// false; a malformed overlay never aborts the run.
fn apply_conditional_filters(node: &FilterNode, conditions: &ConditionContext) -> FilterNode {
    let mut out = FilterNode {
        mode: node.mode,
        allow: node.allow.clone(),
        block: node.block.clone(),
        when: Vec::new(),
        children: BTreeMap::new(),
    };
    for overlay in &node.when {
        if conditional_holds(overlay, conditions) {
            out.allow.extend(overlay.allow.iter().cloned());
            out.block.extend(overlay.block.iter().cloned());
        }
    }
    for (name, child) in &node.children {
        out.children
            .insert(name.clone(), apply_conditional_filters(child, conditions));
    }
    out
}

fn conditional_holds(overlay: &ConditionalFilter, conditions: &ConditionContext) -> bool {
    match evaluate_text(&overlay.condition, conditions) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(
                condition = %overlay.condition,
                error = %err,
                "failed to evaluate conditional filter, treating as false"
            );
            false
        }
    }
}

/// Final option map per adapter: base options, then each matching
/// conditional patch in order (later wins).
fn final_adapter_configs(
    adapters: &BTreeMap<String, AdapterConfig>,
    conditions: &ConditionContext,
) -> BTreeMap<String, Options> {
    let mut out = BTreeMap::new();
    for (name, config) in adapters {
        let mut options = config.base_options.clone();
        for conditional in &config.conditional_options {
            let holds = match evaluate_text(&conditional.condition, conditions) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(
                        adapter = %name,
                        condition = %conditional.condition,
                        error = %err,
                        "failed to evaluate conditional adapter options, treating as false"
                    );
                    false
                }
            };
            if holds {
                for (key, value) in &conditional.options {
                    options.insert(key.clone(), value.clone());
                }
            }
        }
        out.insert(name.clone(), options);
    }
    out
}

/// A target rule compiled for matching, with its application order.
struct TargetSpec {
    /// Characters outside wildcards: higher applies later (wins).
    specificity: usize,
    /// Declaration index, tie-breaker.
    index: usize,
    /// Compiled patterns.
    globs: GlobSet,
    /// Adapter name → option patch.
    patches: BTreeMap<String, Options>,
}

fn compile_targets(targets: &[TargetRule]) -> Result<Vec<TargetSpec>, globset::Error> {
    let mut specs = Vec::new();
    for (index, rule) in targets.iter().enumerate() {
        let mut builder = GlobSetBuilder::new();
        for pattern in &rule.patterns {
            let body = pattern.trim_start_matches('/');
            builder.add(Glob::new(body)?);
            if !pattern.starts_with('/') {
                builder.add(Glob::new(&format!("**/{body}"))?);
            }
        }
        let specificity = rule
            .patterns
            .iter()
            .map(|p| p.chars().filter(|c| *c != '*' && *c != '?').count())
            .sum();
        specs.push(TargetSpec {
            specificity,
            index,
            globs: builder.build()?,
            patches: rule.adapter_patches.clone(),
        });
    }
    // Least specific first, so more specific patches overwrite them.
    specs.sort_by_key(|s| (s.specificity, s.index));
    Ok(specs)
}

fn adapter_overrides(rel_engine: &str, specs: &[TargetSpec]) -> BTreeMap<String, Options> {
    let mut out: BTreeMap<String, Options> = BTreeMap::new();
    for spec in specs {
        if !spec.globs.is_match(rel_engine) {
            continue;
        }
        for (adapter, patch) in &spec.patches {
            let entry = out.entry(adapter.clone()).or_default();
            for (key, value) in patch {
                entry.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Collects the section's files in one walk.
fn collect_files(
    params: &ManifestParams<'_>,
    engine: &FilterEngine,
    adapters_cfg: &BTreeMap<String, Options>,
    target_specs: &[TargetSpec],
    changed: Option<&BTreeSet<String>>,
) -> Vec<FileEntry> {
    let scope_rel = params.scope_rel;
    let extensions: BTreeSet<String> = params.extensions.iter().cloned().collect();
    let gitignore = GitignoreMatcher::load(params.repo_root);

    let pruner = |rel_dir: &str| -> bool {
        if scope_rel.is_empty() {
            return engine.may_descend(rel_dir);
        }
        let is_ancestor = scope_rel == rel_dir || scope_rel.starts_with(&format!("{rel_dir}/"));
        let inside = strip_prefix_posix(rel_dir, scope_rel);
        match (is_ancestor, inside) {
            // Above the scope: the section's filters do not apply yet.
            (true, None) => true,
            // The scope root itself or below it: ask the engine.
            (_, Some(sub)) => sub.is_empty() || engine.may_descend(sub),
            // A branch that can never reach the scope.
            (false, None) => false,
        }
    };

    let mut out = Vec::new();
    for abs_path in walk_files(params.repo_root, &extensions, &gitignore, pruner) {
        let Some(rel) = rel_posix(&abs_path, params.repo_root) else {
            continue;
        };

        if let Some(changed) = changed {
            if !changed.contains(&rel) {
                continue;
            }
        }

        // Confine to the section's scope and rebase for its filter tree.
        let Some(rel_engine) = strip_prefix_posix(&rel, scope_rel) else {
            continue;
        };
        if rel_engine.is_empty() || !engine.includes(rel_engine) {
            continue;
        }

        let size_bytes = abs_path.metadata().map(|m| m.len()).unwrap_or(0);
        if size_bytes == 0 && skip_empty_file(&abs_path, params, adapters_cfg) {
            continue;
        }

        out.push(FileEntry {
            language_hint: language_for_file(&abs_path).to_string(),
            adapter_overrides: adapter_overrides(rel_engine, target_specs),
            rel_path: rel,
            abs_path,
            size_bytes,
        });
    }

    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    out
}

/// Whether an empty file should be skipped: the section's policy unless the
/// responsible adapter's `empty_policy` overrides it.
fn skip_empty_file(
    path: &Path,
    params: &ManifestParams<'_>,
    adapters_cfg: &BTreeMap<String, Options>,
) -> bool {
    let adapter_name = (params.adapter_namer)(path);
    let policy = adapters_cfg
        .get(&adapter_name)
        .map(EmptyPolicy::from_options)
        .unwrap_or_default();
    match policy {
        EmptyPolicy::Include => false,
        EmptyPolicy::Exclude => true,
        EmptyPolicy::Inherit => params.skip_empty,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lg_vcs::NullVcs;

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        write(&root.join("main.py"), "x = 1\n");
        write(&root.join("lib/util.py"), "u = 2\n");
        write(&root.join("lib/__init__.py"), "");
        write(&root.join("docs/guide.md"), "# Guide\n");
        Fixture { _tmp: tmp, root }
    }

    fn filters(yaml: &str) -> FilterNode {
        let section: lg_config::SectionConfig = {
            let doc = serde_yaml::from_str(&format!(
                "filters:\n{}",
                yaml.lines().map(|l| format!("  {l}\n")).collect::<String>()
            ))
            .unwrap();
            lg_config::SectionConfig::from_yaml("t", &doc).unwrap()
        };
        section.filters.unwrap()
    }

    fn base_params<'a>(
        fx: &'a Fixture,
        tree: &'a FilterNode,
        extensions: &'a [String],
        conditions: &'a ConditionContext,
        adapters: &'a BTreeMap<String, AdapterConfig>,
        targets: &'a [TargetRule],
        vcs: &'a NullVcs,
        namer: &'a dyn Fn(&Path) -> String,
    ) -> ManifestParams<'a> {
        ManifestParams {
            repo_root: &fx.root,
            scope_rel: "",
            filters: tree,
            extensions,
            adapters,
            targets,
            skip_empty: true,
            path_labels: PathLabelMode::ScopeRelative,
            conditions,
            vcs,
            vcs_mode: VcsMode::All,
            target_branch: None,
            adapter_namer: namer,
        }
    }

    fn python_namer(path: &Path) -> String {
        if path.extension().is_some_and(|e| e == "py") {
            "python".to_string()
        } else {
            "base".to_string()
        }
    }

    #[test]
    fn selects_by_extension_and_filters() {
        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/**\"]");
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;
        let params = base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);

        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        // Sorted, markdown excluded by extension, empty __init__.py skipped.
        assert_eq!(rels, vec!["lib/util.py", "main.py"]);
        assert!(!manifest.is_doc_only);
    }

    #[test]
    fn conditional_filter_adds_paths_when_tag_active() {
        // A `when` overlay admits __init__.py only under its tag.
        let fx = fixture();
        let tree = filters(
            "mode: allow\nallow: [\"/main.py\"]\nwhen:\n  - condition: \"tag:include-inits\"\n    allow: [\"/lib/__init__.py\"]",
        );
        let exts = vec![".py".to_string()];
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;

        let without = ConditionContext::default();
        let mut params = base_params(&fx, &tree, &exts, &without, &adapters, &[], &vcs, &namer);
        params.skip_empty = false;
        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.py"]);

        let with_tag = ConditionContext::with_tags(["include-inits"]);
        let mut params = base_params(&fx, &tree, &exts, &with_tag, &adapters, &[], &vcs, &namer);
        params.skip_empty = false;
        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["lib/__init__.py", "main.py"]);
    }

    #[test]
    fn invalid_condition_logged_and_skipped() {
        let fx = fixture();
        let tree = filters(
            "mode: allow\nallow: [\"/main.py\"]\nwhen:\n  - condition: \"@@@ bogus\"\n    allow: [\"/lib/util.py\"]",
        );
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;
        let params = base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);

        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.py"]);
    }

    #[test]
    fn doc_only_section_forces_vcs_all() {
        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/docs/\"]");
        let exts = vec![".md".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;
        let mut params = base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);
        params.vcs_mode = VcsMode::Changes;

        let manifest = build_manifest(&params).unwrap();
        assert!(manifest.is_doc_only);
        assert_eq!(manifest.effective_vcs_mode, VcsMode::All);
        // NullVcs reports nothing changed, yet the doc file is present.
        assert_eq!(manifest.files.len(), 1);
    }

    #[test]
    fn changes_mode_filters_to_changed_set() {
        struct FixedVcs(BTreeSet<String>);
        impl VcsProvider for FixedVcs {
            fn changed_files(&self, _root: &Path) -> BTreeSet<String> {
                self.0.clone()
            }
            fn branch_changed_files(
                &self,
                _root: &Path,
                _target: Option<&str>,
            ) -> BTreeSet<String> {
                self.0.clone()
            }
        }

        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/**\"]");
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = FixedVcs(["main.py".to_string()].into());
        let namer = python_namer as fn(&Path) -> String;
        let mut params = ManifestParams {
            vcs: &vcs,
            ..base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &NullVcs, &namer)
        };
        params.vcs_mode = VcsMode::Changes;

        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.py"]);
        assert_eq!(manifest.effective_vcs_mode, VcsMode::Changes);
    }

    #[test]
    fn targets_apply_by_specificity() {
        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/**\"]");
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;

        let targets = vec![
            TargetRule {
                patterns: vec!["lib/**".into()],
                adapter_patches: [(
                    "python".to_string(),
                    [
                        ("a".to_string(), serde_json::json!(1)),
                        ("b".to_string(), serde_json::json!(1)),
                    ]
                    .into(),
                )]
                .into(),
            },
            TargetRule {
                patterns: vec!["lib/util.py".into()],
                adapter_patches: [(
                    "python".to_string(),
                    [("b".to_string(), serde_json::json!(2))].into(),
                )]
                .into(),
            },
        ];

        let params = base_params(&fx, &tree, &exts, &conditions, &adapters, &targets, &vcs, &namer);
        let manifest = build_manifest(&params).unwrap();
        let util = manifest
            .files
            .iter()
            .find(|f| f.rel_path == "lib/util.py")
            .unwrap();
        let patch = &util.adapter_overrides["python"];
        // The broad rule applied first, the specific rule overrode `b`.
        assert_eq!(patch["a"], serde_json::json!(1));
        assert_eq!(patch["b"], serde_json::json!(2));

        let main = manifest.files.iter().find(|f| f.rel_path == "main.py").unwrap();
        assert!(main.adapter_overrides.is_empty());
    }

    #[test]
    fn conditional_adapter_options_applied_in_order() {
        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/**\"]");
        let exts = vec![".py".to_string()];
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;

        let mut adapters = BTreeMap::new();
        adapters.insert(
            "python".to_string(),
            AdapterConfig {
                base_options: [("skip".to_string(), serde_json::json!(true))].into(),
                conditional_options: vec![
                    lg_config::ConditionalOptions {
                        condition: "tag:a".into(),
                        options: [("skip".to_string(), serde_json::json!(false))].into(),
                    },
                    lg_config::ConditionalOptions {
                        condition: "tag:a AND tag:b".into(),
                        options: [("skip".to_string(), serde_json::json!(true))].into(),
                    },
                ],
            },
        );

        let conditions = ConditionContext::with_tags(["a"]);
        let params =
            base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);
        let manifest = build_manifest(&params).unwrap();
        assert_eq!(manifest.adapters_cfg["python"]["skip"], serde_json::json!(false));

        let conditions = ConditionContext::with_tags(["a", "b"]);
        let params =
            base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);
        let manifest = build_manifest(&params).unwrap();
        // The later matching rule wins.
        assert_eq!(manifest.adapters_cfg["python"]["skip"], serde_json::json!(true));
    }

    #[test]
    fn empty_policy_include_keeps_empty_files() {
        let fx = fixture();
        let tree = filters("mode: allow\nallow: [\"/**\"]");
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;

        let mut adapters = BTreeMap::new();
        adapters.insert(
            "python".to_string(),
            AdapterConfig {
                base_options: [("empty_policy".to_string(), serde_json::json!("include"))].into(),
                conditional_options: Vec::new(),
            },
        );

        let params = base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);
        let manifest = build_manifest(&params).unwrap();
        assert!(manifest.files.iter().any(|f| f.rel_path == "lib/__init__.py"));
    }

    #[test]
    fn scoped_section_sees_only_its_subtree() {
        let fx = fixture();
        write(&fx.root.join("apps/web/src/app.py"), "a\n");
        let tree = filters("mode: allow\nallow: [\"/src/\"]");
        let exts = vec![".py".to_string()];
        let conditions = ConditionContext::default();
        let adapters = BTreeMap::new();
        let vcs = NullVcs;
        let namer = python_namer as fn(&Path) -> String;
        let mut params = base_params(&fx, &tree, &exts, &conditions, &adapters, &[], &vcs, &namer);
        params.scope_rel = "apps/web";

        let manifest = build_manifest(&params).unwrap();
        let rels: Vec<&str> = manifest.files.iter().map(|f| f.rel_path.as_str()).collect();
        // rel_path stays repo-relative; filters were applied scope-relative.
        assert_eq!(rels, vec!["apps/web/src/app.py"]);
    }
}

//! Listing API: sections, mode-sets, tag-sets, contexts.
//!
//! These back the CLI's `list` subcommands; all output orders are stable
//! (id-sorted).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use lg_adaptive::{
    AdaptiveModel, CLIPBOARD_PROVIDER, ExtendsResolver, validate_provider_support,
};
use lg_address::AddressingContext;
use lg_cache::Cache;
use lg_config::SectionStore;
use lg_path::{cfg_root, rel_posix};

use crate::context::ContextResolver;
use crate::engine::TOOL_VERSION;
use crate::error::EngineError;

/// A mode in listing output.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSchema {
    /// Mode id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Description, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Activated tags, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Provider run commands, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<BTreeMap<String, String>>,
}

/// A mode-set in listing output.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSetSchema {
    /// Mode-set id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Whether this is the integration mode-set.
    pub integration: bool,
    /// Modes, id-sorted.
    pub modes: Vec<ModeSchema>,
}

/// `list mode-sets` output.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSetsList {
    /// Mode-sets, id-sorted.
    #[serde(rename = "mode-sets")]
    pub mode_sets: Vec<ModeSetSchema>,
}

/// A tag in listing output.
#[derive(Debug, Clone, Serialize)]
pub struct TagSchema {
    /// Tag id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Description, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A tag-set in listing output.
#[derive(Debug, Clone, Serialize)]
pub struct TagSetSchema {
    /// Tag-set id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Tags, id-sorted.
    pub tags: Vec<TagSchema>,
}

/// `list tag-sets` output.
#[derive(Debug, Clone, Serialize)]
pub struct TagSetsList {
    /// Tag-sets, id-sorted.
    #[serde(rename = "tag-sets")]
    pub tag_sets: Vec<TagSetSchema>,
}

/// One section with its adaptive configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    /// Section key.
    pub name: String,
    /// Mode-sets reachable through the section's extends chain.
    #[serde(rename = "mode-sets")]
    pub mode_sets: Vec<ModeSetSchema>,
    /// Tag-sets reachable through the section's extends chain.
    #[serde(rename = "tag-sets")]
    pub tag_sets: Vec<TagSetSchema>,
}

/// `list sections` output.
#[derive(Debug, Clone, Serialize)]
pub struct SectionsList {
    /// Renderable sections, name-sorted.
    pub sections: Vec<SectionInfo>,
}

/// `list contexts` output.
#[derive(Debug, Clone, Serialize)]
pub struct ContextsList {
    /// Context names, sorted.
    pub contexts: Vec<String>,
}

fn mode_sets_schema(model: &AdaptiveModel) -> Vec<ModeSetSchema> {
    model
        .mode_sets
        .values()
        .map(|set| ModeSetSchema {
            id: set.id.clone(),
            title: set.title.clone(),
            integration: set.is_integration(),
            modes: set
                .modes
                .values()
                .map(|mode| ModeSchema {
                    id: mode.id.clone(),
                    title: mode.title.clone(),
                    description: (!mode.description.is_empty())
                        .then(|| mode.description.clone()),
                    tags: (!mode.tags.is_empty()).then(|| mode.tags.clone()),
                    runs: (!mode.runs.is_empty()).then(|| mode.runs.clone()),
                })
                .collect(),
        })
        .collect()
}

fn tag_sets_schema(model: &AdaptiveModel) -> Vec<TagSetSchema> {
    model
        .tag_sets
        .values()
        .map(|set| TagSetSchema {
            id: set.id.clone(),
            title: set.title.clone(),
            tags: set
                .tags
                .values()
                .map(|tag| TagSchema {
                    id: tag.id.clone(),
                    title: tag.title.clone(),
                    description: (!tag.description.is_empty())
                        .then(|| tag.description.clone()),
                })
                .collect(),
        })
        .collect()
}

fn make_store(root: &Path) -> (SectionStore, AddressingContext) {
    let cache = Rc::new(Cache::new(root, None, false, TOOL_VERSION));
    (
        SectionStore::new(root, cache, TOOL_VERSION),
        AddressingContext::new(root),
    )
}

/// Lists context names (files `lg-cfg/**/<name>.ctx.md`), sorted.
pub fn list_contexts(root: &Path) -> Vec<String> {
    let cfg = cfg_root(root);
    let mut out = Vec::new();
    let mut stack = vec![cfg.clone()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path: PathBuf = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Some(rel) = rel_posix(&path, &cfg) {
                if let Some(name) = rel.strip_suffix(".ctx.md") {
                    out.push(name.to_string());
                }
            }
        }
    }
    out.sort();
    out
}

/// Lists renderable sections with their adaptive configuration.
pub fn list_sections(root: &Path) -> Result<SectionsList, EngineError> {
    let (store, addressing) = make_store(root);
    let extends = ExtendsResolver::new(&store);
    let resolver = ContextResolver::new(&store, &addressing, &extends);

    let mut sections = Vec::new();
    for name in store.list_renderable(root)? {
        let (model, _) = resolver.resolve_for_section(&name)?;
        sections.push(SectionInfo {
            name,
            mode_sets: mode_sets_schema(&model),
            tag_sets: tag_sets_schema(&model),
        });
    }
    Ok(SectionsList { sections })
}

/// Lists a context's mode-sets, filtered for a provider.
///
/// Validates provider support first; the clipboard
/// provider sees everything unfiltered.
pub fn list_mode_sets(
    root: &Path,
    context: &str,
    provider: &str,
) -> Result<ModeSetsList, EngineError> {
    let (store, addressing) = make_store(root);
    let extends = ExtendsResolver::new(&store);
    let resolver = ContextResolver::new(&store, &addressing, &extends);

    let (model, _) = resolver.resolve_for_context(context)?;
    validate_provider_support(&model, provider, context)?;

    let filtered = if provider == CLIPBOARD_PROVIDER {
        model
    } else {
        model.filter_by_provider(provider)
    };
    Ok(ModeSetsList {
        mode_sets: mode_sets_schema(&filtered),
    })
}

/// Lists a context's tag-sets.
pub fn list_tag_sets(root: &Path, context: &str) -> Result<TagSetsList, EngineError> {
    let (store, addressing) = make_store(root);
    let extends = ExtendsResolver::new(&store);
    let resolver = ContextResolver::new(&store, &addressing, &extends);

    let (model, _) = resolver.resolve_for_context(context)?;
    Ok(TagSetsList {
        tag_sets: tag_sets_schema(&model),
    })
}

/// Lists contexts compatible with a provider.
///
/// Clipboard is universally compatible. Contexts whose adaptive
/// configuration fails to resolve are skipped, not errors.
pub fn list_contexts_for_provider(root: &Path, provider: &str) -> ContextsList {
    let all = list_contexts(root);
    if provider == CLIPBOARD_PROVIDER {
        return ContextsList { contexts: all };
    }

    let (store, addressing) = make_store(root);
    let extends = ExtendsResolver::new(&store);
    let resolver = ContextResolver::new(&store, &addressing, &extends);

    let contexts = all
        .into_iter()
        .filter(|name| match resolver.resolve_for_context(name) {
            Ok((model, _)) => model
                .integration_mode_set()
                .is_some_and(|set| set.supported_providers().contains(provider)),
            Err(err) => {
                tracing::debug!(context = %name, error = %err, "context skipped in provider listing");
                false
            }
        })
        .collect();
    ContextsList { contexts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn seed_project(root: &Path) {
        write(
            &root.join("lg-cfg/ai.sec.yaml"),
            r#"
ai-interaction:
  mode-sets:
    ai-interaction:
      modes:
        ask:
          title: "Ask"
          runs: {"com.test.provider": "--ask"}
"#,
        );
        write(
            &root.join("lg-cfg/sections.yaml"),
            "src:\n  extends: [\"ai-interaction\"]\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
        );
        write(&root.join("lg-cfg/t.ctx.md"), "# T\n${src}\n");
    }

    #[test]
    fn mode_sets_for_supported_provider() {
        // Exactly one integration mode-set containing `ask`.
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());

        let list = list_mode_sets(tmp.path(), "t", "com.test.provider").unwrap();
        let integration: Vec<&ModeSetSchema> =
            list.mode_sets.iter().filter(|s| s.integration).collect();
        assert_eq!(integration.len(), 1);
        assert_eq!(integration[0].modes.len(), 1);
        assert_eq!(integration[0].modes[0].id, "ask");
    }

    #[test]
    fn unsupported_provider_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());

        let err = list_mode_sets(tmp.path(), "t", "com.other").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Adaptive(lg_adaptive::AdaptiveError::ProviderNotSupported { .. })
        ));
    }

    #[test]
    fn clipboard_sees_everything() {
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());

        let list = list_mode_sets(tmp.path(), "t", "clipboard").unwrap();
        assert_eq!(list.mode_sets.len(), 1);

        let contexts = list_contexts_for_provider(tmp.path(), "clipboard");
        assert_eq!(contexts.contexts, vec!["t"]);
    }

    #[test]
    fn provider_compatibility_filters_contexts() {
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());

        let good = list_contexts_for_provider(tmp.path(), "com.test.provider");
        assert_eq!(good.contexts, vec!["t"]);
        let none = list_contexts_for_provider(tmp.path(), "com.other");
        assert!(none.contexts.is_empty());
    }

    #[test]
    fn sections_listing_excludes_meta() {
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());

        let list = list_sections(tmp.path()).unwrap();
        let names: Vec<&str> = list.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["src"]);
        // The extends chain's mode-set is visible on the section.
        assert_eq!(list.sections[0].mode_sets.len(), 1);
    }

    #[test]
    fn contexts_found_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        seed_project(tmp.path());
        write(&tmp.path().join("lg-cfg/sub/deep.ctx.md"), "x\n");

        let contexts = list_contexts(tmp.path());
        assert_eq!(contexts, vec!["sub/deep", "t"]);
    }
}

//! Section collection for adaptive-model resolution.
//!
//! Before a context renders, every section it *could* touch must
//! contribute its adaptive data, including sections inside `{% if %}` and
//! `{% mode %}` blocks, whose conditions are deliberately not evaluated
//! here. Collection order is frontmatter includes first, then body
//! sections in order of first appearance, following nested includes
//! depth-first.

use std::collections::BTreeSet;
use std::fs;

use lg_address::{
    AddressingContext, ResolvedSection, ResourceConfig, SectionResolver, parse, resolve_file,
};
use lg_config::SectionStore;

use crate::error::TemplateError;
use crate::frontmatter::parse_frontmatter;
use crate::node::{IncludeKind, TemplateNode};
use crate::parser::parse_template;

/// The sections a context touches, in deterministic collection order.
#[derive(Debug)]
pub struct CollectedSections {
    /// All collected sections, deduplicated by canonical key, in order.
    pub sections: Vec<ResolvedSection>,
    /// Canonical keys that appear in template bodies (as opposed to
    /// frontmatter-only includes, which feed the adaptive model but are
    /// never rendered).
    pub body_keys: BTreeSet<String>,
}

impl CollectedSections {
    /// Sections that appear in template bodies (the renderable set).
    pub fn template_sections(&self) -> impl Iterator<Item = &ResolvedSection> {
        self.sections
            .iter()
            .filter(|s| self.body_keys.contains(&s.canon_key()))
    }
}

/// Collects section references from a context and its includes.
pub struct SectionCollector<'a> {
    /// Section lookup.
    store: &'a SectionStore,
    /// Directory-context stack (shared with the engine's run).
    addressing: &'a AddressingContext,
}

impl<'a> SectionCollector<'a> {
    /// Creates a collector over the run's services.
    pub fn new(store: &'a SectionStore, addressing: &'a AddressingContext) -> Self {
        Self { store, addressing }
    }

    /// Collects every section a context touches, transitively.
    pub fn collect(&self, context_name: &str) -> Result<CollectedSections, TemplateError> {
        let mut collected = CollectedSections {
            sections: Vec::new(),
            body_keys: BTreeSet::new(),
        };
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut include_stack: Vec<String> = Vec::new();
        self.collect_file(
            IncludeKind::Context,
            context_name,
            &mut collected,
            &mut seen,
            &mut include_stack,
        )?;
        Ok(collected)
    }

    fn collect_file(
        &self,
        kind: IncludeKind,
        reference: &str,
        collected: &mut CollectedSections,
        seen: &mut BTreeSet<String>,
        include_stack: &mut Vec<String>,
    ) -> Result<(), TemplateError> {
        let config = match kind {
            IncludeKind::Template => ResourceConfig::template(),
            IncludeKind::Context => ResourceConfig::context(),
            IncludeKind::Markdown => return Ok(()),
        };
        let parsed_ref = parse(reference, &config)?;
        let resolved = resolve_file(&parsed_ref, &config, self.addressing)?;

        let marker = format!(
            "{}::{}",
            resolved.cfg_root.display(),
            resolved.resource_rel
        );
        if include_stack.contains(&marker) {
            let mut chain = include_stack.clone();
            chain.push(marker);
            return Err(TemplateError::Cycle { chain });
        }

        let source = fs::read_to_string(&resolved.resource_path).map_err(|_| {
            TemplateError::NotFound {
                path: resolved.resource_path.clone(),
            }
        })?;

        let crosses_scope = resolved.cfg_root != self.addressing.current().cfg_root;
        let new_origin = crosses_scope.then(|| resolved.scope_rel.clone());
        self.addressing
            .push_file(&resolved.cfg_root, &resolved.resource_rel, new_origin);
        include_stack.push(marker);

        let result = (|| {
            let body = if kind == IncludeKind::Context {
                let (frontmatter, body) = parse_frontmatter(&source);
                if let Some(frontmatter) = frontmatter {
                    for include in &frontmatter.include {
                        self.add_section(include, false, collected, seen)?;
                    }
                }
                body.to_string()
            } else {
                source
            };

            let parsed = parse_template(&body).map_err(|message| TemplateError::Parse {
                name: resolved.resource_rel.clone(),
                message,
            })?;
            self.collect_nodes(&parsed.nodes, collected, seen, include_stack)
        })();

        include_stack.pop();
        self.addressing.pop();
        result
    }

    fn collect_nodes(
        &self,
        nodes: &[TemplateNode],
        collected: &mut CollectedSections,
        seen: &mut BTreeSet<String>,
        include_stack: &mut Vec<String>,
    ) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                TemplateNode::Text(_) => {}
                TemplateNode::Section(reference) => {
                    self.add_section(reference, true, collected, seen)?;
                }
                TemplateNode::Include { kind, reference } => {
                    self.collect_file(*kind, reference, collected, seen, include_stack)?;
                }
                TemplateNode::If {
                    branches,
                    else_body,
                } => {
                    // Conditions are not evaluated during collection: every
                    // branch contributes.
                    for (_, body) in branches {
                        self.collect_nodes(body, collected, seen, include_stack)?;
                    }
                    if let Some(body) = else_body {
                        self.collect_nodes(body, collected, seen, include_stack)?;
                    }
                }
                TemplateNode::Mode { body, .. } => {
                    self.collect_nodes(body, collected, seen, include_stack)?;
                }
            }
        }
        Ok(())
    }

    fn add_section(
        &self,
        reference: &str,
        in_body: bool,
        collected: &mut CollectedSections,
        seen: &mut BTreeSet<String>,
    ) -> Result<(), TemplateError> {
        let resolver = SectionResolver::new(self.store);
        let resolved = resolver.resolve(reference, self.addressing)?;
        let key = resolved.canon_key();
        if in_body {
            collected.body_keys.insert(key.clone());
        }
        if seen.insert(key) {
            collected.sections.push(resolved);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::rc::Rc;

    use lg_cache::Cache;

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const SRC: &str = "src:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n";

    fn store_for(root: &Path) -> SectionStore {
        SectionStore::new(root, Rc::new(Cache::new(root, Some(true), false, "t")), "t")
    }

    #[test]
    fn collects_body_sections_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("lg-cfg/sections.yaml"),
            "b:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\na:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
        );
        write(&root.join("lg-cfg/t.ctx.md"), "${b}\n${a}\n${b}\n");

        let store = store_for(root);
        let addressing = AddressingContext::new(root);
        let collector = SectionCollector::new(&store, &addressing);
        let collected = collector.collect("t").unwrap();

        let keys: Vec<String> = collected.sections.iter().map(|s| s.canon_key()).collect();
        // Order of first appearance, deduplicated.
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn frontmatter_includes_collected_first_but_not_body() {
        // A frontmatter-only meta-section feeds the model.
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("lg-cfg/meta.sec.yaml"),
            "meta:\n  tag-sets:\n    language:\n      title: L\n      tags:\n        python: Python\n        ts: TS\n",
        );
        write(&root.join("lg-cfg/sections.yaml"), SRC);
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "---\ninclude: [meta]\n---\n\n${src}\n",
        );

        let store = store_for(root);
        let addressing = AddressingContext::new(root);
        let collector = SectionCollector::new(&store, &addressing);
        let collected = collector.collect("t").unwrap();

        let keys: Vec<String> = collected.sections.iter().map(|s| s.canon_key()).collect();
        assert_eq!(keys, vec!["meta", "src"]);
        assert!(!collected.body_keys.contains("meta"));
        assert!(collected.body_keys.contains("src"));

        let template_keys: Vec<String> = collected
            .template_sections()
            .map(|s| s.canon_key())
            .collect();
        assert_eq!(template_keys, vec!["src"]);
    }

    #[test]
    fn sections_inside_if_blocks_still_collected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("lg-cfg/sections.yaml"),
            "src:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\nextras:\n  extensions: [\".md\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
        );
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "${src}\n{% if tag:never_active %}\n${extras}\n{% endif %}\n",
        );

        let store = store_for(root);
        let addressing = AddressingContext::new(root);
        let collector = SectionCollector::new(&store, &addressing);
        let collected = collector.collect("t").unwrap();

        let keys: Vec<String> = collected.sections.iter().map(|s| s.canon_key()).collect();
        assert_eq!(keys, vec!["src", "extras"]);
    }

    #[test]
    fn nested_template_sections_collected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("lg-cfg/sections.yaml"),
            "docs:\n  extensions: [\".md\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\nsrc:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
        );
        write(&root.join("lg-cfg/inner.tpl.md"), "## Inner\n${docs}\n");
        write(&root.join("lg-cfg/t.ctx.md"), "${tpl:inner}\n${src}\n");

        let store = store_for(root);
        let addressing = AddressingContext::new(root);
        let collector = SectionCollector::new(&store, &addressing);
        let collected = collector.collect("t").unwrap();

        let keys: Vec<String> = collected.sections.iter().map(|s| s.canon_key()).collect();
        // The include's sections come first (depth-first traversal).
        assert_eq!(keys, vec!["docs", "src"]);
    }

    #[test]
    fn include_cycle_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("lg-cfg/a.tpl.md"), "${tpl:b}");
        write(&root.join("lg-cfg/b.tpl.md"), "${tpl:a}");
        write(&root.join("lg-cfg/t.ctx.md"), "${tpl:a}");

        let store = store_for(root);
        let addressing = AddressingContext::new(root);
        let collector = SectionCollector::new(&store, &addressing);
        assert!(matches!(
            collector.collect("t").unwrap_err(),
            TemplateError::Cycle { .. }
        ));
    }
}

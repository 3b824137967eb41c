//! The template evaluator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use lg_address::{AddressingContext, ResolvedFile, ResourceConfig, parse, resolve_file};
use lg_adaptive::{AdaptiveModel, validate_mode_reference};
use lg_cond::evaluate_text;

use crate::error::TemplateError;
use crate::frontmatter::parse_frontmatter;
use crate::node::{IncludeKind, ParsedTemplate, TemplateNode};
use crate::parser::parse_template;
use crate::state::{ActiveState, StateStack};

/// Renders sections for the engine; implemented by the driver, which owns
/// the manifest/planner/adapter machinery.
pub trait SectionHandler {
    /// Renders one section placeholder under the given state.
    fn render_section(
        &self,
        reference: &str,
        state: &ActiveState,
    ) -> Result<String, TemplateError>;
}

/// The two parallel outputs of an expansion.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// The full document: template glue plus section texts.
    pub final_text: String,
    /// Section texts only, in order of appearance (glue stripped).
    pub sections_only: String,
}

/// The template expansion engine for one run.
pub struct TemplateEngine<'a> {
    /// Directory-context stack shared with the rest of the run.
    addressing: &'a AddressingContext,
    /// The context's merged adaptive model.
    model: &'a AdaptiveModel,
    /// Section renderer.
    handler: &'a dyn SectionHandler,
    /// Normalised provider base id, for `provider:` conditions.
    provider_base: Option<String>,
    /// Parsed templates cached by path + mtime.
    parse_cache: RefCell<HashMap<PathBuf, (u64, Rc<ParsedTemplate>)>>,
    /// Expansion stack for cycle detection: `cfg_root::kind:name`.
    expansion_stack: RefCell<Vec<String>>,
    /// The mode/tag state stack.
    state: RefCell<StateStack>,
}

impl<'a> TemplateEngine<'a> {
    /// Creates an engine over the run's services.
    pub fn new(
        addressing: &'a AddressingContext,
        model: &'a AdaptiveModel,
        handler: &'a dyn SectionHandler,
        provider_base: Option<String>,
        base_state: ActiveState,
    ) -> Self {
        Self {
            addressing,
            model,
            handler,
            provider_base,
            parse_cache: RefCell::new(HashMap::new()),
            expansion_stack: RefCell::new(Vec::new()),
            state: RefCell::new(StateStack::new(base_state)),
        }
    }

    /// The current active state (what a section handler would see).
    pub fn current_state(&self) -> ActiveState {
        self.state.borrow().current().clone()
    }

    /// Expands a context by name (without the `.ctx.md` suffix).
    pub fn expand_context(&self, name: &str) -> Result<Expansion, TemplateError> {
        let mut out = Expansion::default();
        self.expand_include(IncludeKind::Context, name, &mut out)?;
        Ok(out)
    }

    // --------------------------- include handling --------------------------- //

    fn resource_config(kind: IncludeKind) -> ResourceConfig {
        match kind {
            IncludeKind::Template => ResourceConfig::template(),
            IncludeKind::Context => ResourceConfig::context(),
            IncludeKind::Markdown => ResourceConfig::markdown(),
        }
    }

    fn kind_label(kind: IncludeKind) -> &'static str {
        match kind {
            IncludeKind::Template => "tpl",
            IncludeKind::Context => "ctx",
            IncludeKind::Markdown => "md",
        }
    }

    fn expand_include(
        &self,
        kind: IncludeKind,
        reference: &str,
        out: &mut Expansion,
    ) -> Result<(), TemplateError> {
        let config = Self::resource_config(kind);
        let parsed_ref = parse(reference, &config)?;
        let resolved = resolve_file(&parsed_ref, &config, self.addressing)?;

        if kind == IncludeKind::Markdown {
            out.final_text.push_str(&self.load_markdown(
                &resolved,
                parsed_ref.anchor.as_deref(),
                &parsed_ref.params,
            )?);
            return Ok(());
        }

        // Cycle detection over the include chain.
        let marker = format!(
            "{}::{}:{}",
            resolved.cfg_root.display(),
            Self::kind_label(kind),
            resolved.resource_rel
        );
        {
            let stack = self.expansion_stack.borrow();
            if stack.contains(&marker) {
                let mut chain = stack.clone();
                chain.push(marker.clone());
                return Err(TemplateError::Cycle { chain });
            }
        }

        let source = fs::read_to_string(&resolved.resource_path).map_err(|_| {
            TemplateError::NotFound {
                path: resolved.resource_path.clone(),
            }
        })?;
        let body = match kind {
            IncludeKind::Context => parse_frontmatter(&source).1.to_string(),
            _ => source,
        };

        let top_level = self.expansion_stack.borrow().is_empty();
        let parsed = self.parse_cached(&resolved, &body)?;
        if parsed.unclosed_blocks > 0 {
            if top_level {
                return Err(TemplateError::Parse {
                    name: resolved.resource_rel.clone(),
                    message: format!(
                        "{} unclosed block(s) at end of file",
                        parsed.unclosed_blocks
                    ),
                });
            }
            tracing::warn!(
                template = %resolved.resource_rel,
                unclosed = parsed.unclosed_blocks,
                "unclosed block auto-closed at include boundary"
            );
        }

        // Crossing scopes resets the current directory and switches the
        // state's origin; staying in the scope just tracks the directory.
        let crosses_scope = resolved.cfg_root != self.addressing.current().cfg_root;
        let new_origin = crosses_scope.then(|| resolved.scope_rel.clone());
        self.addressing
            .push_file(&resolved.cfg_root, &resolved.resource_rel, new_origin);
        if crosses_scope {
            self.state.borrow_mut().push_origin(&resolved.scope_rel);
        }
        self.expansion_stack.borrow_mut().push(marker);

        let result = self.eval_nodes(&parsed.nodes, out);

        self.expansion_stack.borrow_mut().pop();
        if crosses_scope {
            self.state.borrow_mut().pop();
        }
        self.addressing.pop();

        result
    }

    fn parse_cached(
        &self,
        resolved: &ResolvedFile,
        body: &str,
    ) -> Result<Rc<ParsedTemplate>, TemplateError> {
        let mtime = resolved
            .resource_path
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        if let Some((cached_mtime, parsed)) =
            self.parse_cache.borrow().get(&resolved.resource_path)
        {
            if *cached_mtime == mtime {
                return Ok(Rc::clone(parsed));
            }
        }

        let parsed = parse_template(body).map_err(|message| TemplateError::Parse {
            name: resolved.resource_rel.clone(),
            message,
        })?;
        let parsed = Rc::new(parsed);
        self.parse_cache
            .borrow_mut()
            .insert(resolved.resource_path.clone(), (mtime, Rc::clone(&parsed)));
        Ok(parsed)
    }

    // ------------------------------ evaluation ------------------------------ //

    fn eval_nodes(&self, nodes: &[TemplateNode], out: &mut Expansion) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                TemplateNode::Text(text) => out.final_text.push_str(text),
                TemplateNode::Section(reference) => {
                    let state = self.current_state();
                    let rendered = self.handler.render_section(reference, &state)?;
                    out.final_text.push_str(&rendered);
                    out.sections_only.push_str(&rendered);
                }
                TemplateNode::Include { kind, reference } => {
                    self.expand_include(*kind, reference, out)?;
                }
                TemplateNode::If {
                    branches,
                    else_body,
                } => {
                    let condition_ctx = self
                        .state
                        .borrow()
                        .current()
                        .condition_context(self.model, self.provider_base.as_deref());
                    let mut taken = false;
                    for (condition, body) in branches {
                        if evaluate_text(condition, &condition_ctx)? {
                            self.eval_nodes(body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = else_body {
                            self.eval_nodes(body, out)?;
                        }
                    }
                }
                TemplateNode::Mode { set, mode, body } => {
                    validate_mode_reference(self.model, set, mode, "")?;
                    self.state.borrow_mut().push_mode(self.model, set, mode);
                    let result = self.eval_nodes(body, out);
                    self.state.borrow_mut().pop();
                    result?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------- markdown ------------------------------- //

    /// Loads a literal markdown include, applying anchor extraction and
    /// the `notitle` parameter.
    fn load_markdown(
        &self,
        resolved: &ResolvedFile,
        anchor: Option<&str>,
        params: &[String],
    ) -> Result<String, TemplateError> {
        let text =
            fs::read_to_string(&resolved.resource_path).map_err(|_| TemplateError::NotFound {
                path: resolved.resource_path.clone(),
            })?;

        let mut text = match anchor {
            Some(anchor) => extract_anchor(&text, anchor).ok_or_else(|| {
                TemplateError::Processing {
                    name: resolved.resource_rel.clone(),
                    message: format!("anchor '#{anchor}' not found"),
                }
            })?,
            None => text,
        };

        for param in params {
            match param.as_str() {
                "notitle" => text = drop_leading_heading(&text),
                other => {
                    tracing::warn!(param = other, "unknown md include parameter ignored");
                }
            }
        }
        Ok(text)
    }
}

/// Slug of a heading: lowercase, alphanumerics kept, runs of anything else
/// collapsed to `-`.
fn heading_slug(heading: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in heading.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Extracts the section starting at the heading matching `anchor` (by slug
/// or literal text), up to the next heading of the same or higher level.
fn extract_anchor(text: &str, anchor: &str) -> Option<String> {
    let mut out: Vec<&str> = Vec::new();
    let mut level = 0usize;
    let mut capturing = false;

    for line in text.lines() {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        let is_heading = hashes > 0 && hashes <= 6 && line[hashes..].starts_with(' ');
        if is_heading {
            let title = line[hashes..].trim();
            if capturing && hashes <= level {
                break;
            }
            if !capturing && (heading_slug(title) == heading_slug(anchor) || title == anchor) {
                capturing = true;
                level = hashes;
            }
        }
        if capturing {
            out.push(line);
        }
    }

    capturing.then(|| {
        let mut section = out.join("\n");
        section.push('\n');
        section
    })
}

/// Drops the first heading line of a text (the `notitle` parameter).
fn drop_leading_heading(text: &str) -> String {
    let mut lines = text.lines();
    let mut out: Vec<&str> = Vec::new();
    let mut dropped = false;
    for line in lines.by_ref() {
        if !dropped && line.starts_with('#') {
            dropped = true;
            continue;
        }
        if !dropped && line.trim().is_empty() {
            continue;
        }
        out.push(line);
    }
    let mut result = out.join("\n");
    if text.ends_with('\n') && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell as TestRefCell;
    use std::collections::BTreeMap;
    use std::path::Path;

    use lg_adaptive::{Mode, ModeSet};

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Records every render call and returns `<ref>` as the section text.
    struct RecordingHandler {
        calls: TestRefCell<Vec<(String, ActiveState)>>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                calls: TestRefCell::new(Vec::new()),
            }
        }
    }

    impl SectionHandler for RecordingHandler {
        fn render_section(
            &self,
            reference: &str,
            state: &ActiveState,
        ) -> Result<String, TemplateError> {
            self.calls
                .borrow_mut()
                .push((reference.to_string(), state.clone()));
            Ok(format!("<{reference}>\n"))
        }
    }

    fn model_with_modes() -> AdaptiveModel {
        let agent = Mode {
            id: "agent".into(),
            title: "Agent".into(),
            tags: vec!["agent".into()],
            ..Mode::default()
        };
        let ask = Mode {
            id: "ask".into(),
            title: "Ask".into(),
            runs: [("com.test".to_string(), "--ask".to_string())].into(),
            ..Mode::default()
        };
        let set = ModeSet {
            id: "ai".into(),
            title: "AI".into(),
            modes: [
                ("agent".to_string(), agent),
                ("ask".to_string(), ask),
            ]
            .into(),
        };
        let mut model = AdaptiveModel::default();
        model.mode_sets.insert("ai".into(), set);
        model
    }

    fn repo() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("lg-cfg")).unwrap();
        (tmp, root)
    }

    #[test]
    fn minimal_context_expansion() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/t.ctx.md"), "# Title\n${src}\n");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert_eq!(out.final_text, "# Title\n<src>\n\n");
        assert_eq!(out.sections_only, "<src>\n");
        assert_eq!(handler.calls.borrow().len(), 1);
    }

    #[test]
    fn frontmatter_stripped_from_output() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "---\ninclude: [meta]\n---\n\nBody ${src}\n",
        );

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert!(!out.final_text.contains("include:"));
        assert!(out.final_text.starts_with("Body "));
    }

    #[test]
    fn nested_template_include() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/inner.tpl.md"), "## Inner\n${docs}\n");
        write(&root.join("lg-cfg/t.ctx.md"), "${tpl:inner}${src}\n");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert_eq!(out.final_text, "## Inner\n<docs>\n\n<src>\n\n");
        assert_eq!(out.sections_only, "<docs>\n<src>\n");
    }

    #[test]
    fn template_cycle_detected() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/a.tpl.md"), "${tpl:b}");
        write(&root.join("lg-cfg/b.tpl.md"), "${tpl:a}");
        write(&root.join("lg-cfg/t.ctx.md"), "${tpl:a}");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let err = engine.expand_context("t").unwrap_err();
        assert!(matches!(err, TemplateError::Cycle { .. }));
    }

    #[test]
    fn if_blocks_follow_tags_but_else_branch() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "{% if tag:on %}YES{% else %}NO{% endif %}\n",
        );

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();

        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());
        assert_eq!(engine.expand_context("t").unwrap().final_text, "NO\n");

        let mut state = ActiveState::default();
        state.active_tags.insert("on".into());
        let addressing2 = AddressingContext::new(&root);
        let engine = TemplateEngine::new(&addressing2, &model, &handler, None, state);
        assert_eq!(engine.expand_context("t").unwrap().final_text, "YES\n");
    }

    #[test]
    fn mode_block_scopes_state() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "{% if tag:agent %}before{% endif %}{% mode ai:agent %}${src}{% endmode %}{% if tag:agent %}after{% endif %}\n",
        );

        let addressing = AddressingContext::new(&root);
        let model = model_with_modes();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert!(!out.final_text.contains("before"));
        assert!(!out.final_text.contains("after"));

        // The section rendered inside the block saw the mode's state.
        let calls = handler.calls.borrow();
        let (reference, state) = &calls[0];
        assert_eq!(reference, "src");
        assert!(state.active_tags.contains("agent"));
        assert_eq!(state.active_modes["ai"], "agent");
    }

    #[test]
    fn unknown_mode_reference_fails() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/t.ctx.md"), "{% mode nope:x %}y{% endmode %}\n");

        let addressing = AddressingContext::new(&root);
        let model = model_with_modes();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let err = engine.expand_context("t").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Adaptive(lg_adaptive::AdaptiveError::InvalidModeReference { .. })
        ));
    }

    #[test]
    fn unclosed_block_fatal_at_top_level() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/t.ctx.md"), "{% if tag:a %}never closed\n");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        assert!(matches!(
            engine.expand_context("t").unwrap_err(),
            TemplateError::Parse { .. }
        ));
    }

    #[test]
    fn unclosed_block_in_nested_include_warns_and_autocloses() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/part.tpl.md"), "{% if tag:x %}hidden\n");
        write(&root.join("lg-cfg/t.ctx.md"), "ok ${tpl:part}done\n");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert!(out.final_text.contains("ok "));
        assert!(out.final_text.contains("done"));
        assert!(!out.final_text.contains("hidden"));
    }

    #[test]
    fn markdown_include_with_anchor_and_notitle() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/docs/arch.md"),
            "# Architecture\n\nIntro text.\n\n## Storage\n\nDisk layout.\n\n## Network\n\nWire format.\n",
        );
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "${md:docs/arch#storage,notitle}",
        );

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert!(out.final_text.contains("Disk layout."));
        assert!(!out.final_text.contains("## Storage"));
        assert!(!out.final_text.contains("Wire format."));
        // Literal includes are glue, not sections.
        assert!(out.sections_only.is_empty());
    }

    #[test]
    fn cross_scope_include_switches_origin() {
        // A child-scope context pulls a markdown file from the
        // parent scope.
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/adaptability/architecture.md"),
            "# Arch\n\nShared body.\n",
        );
        fs::create_dir_all(root.join("vscode/lg-cfg/adaptability")).unwrap();
        write(
            &root.join("vscode/lg-cfg/adaptability/_.ctx.md"),
            "${md@..:adaptability/architecture}",
        );
        write(&root.join("vscode/lg-cfg/t.ctx.md"), "${ctx:adaptability/_}");

        // Run from the vscode scope.
        let addressing = AddressingContext::new(&root);
        addressing.push_file(&root.join("vscode/lg-cfg"), "", Some("vscode".into()));
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert!(out.final_text.contains("Shared body."));
    }

    #[test]
    fn state_restored_after_expansion() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "{% mode ai:agent %}x{% endmode %}",
        );

        let addressing = AddressingContext::new(&root);
        let model = model_with_modes();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let before = engine.current_state();
        let _ = engine.expand_context("t").unwrap();
        assert_eq!(engine.current_state(), before);
        // The engine's own frame was popped on the way out.
        assert_eq!(addressing.depth(), 1);
    }

    #[test]
    fn same_section_rendered_each_time() {
        let (_tmp, root) = repo();
        write(&root.join("lg-cfg/t.ctx.md"), "${src}${src}");

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine =
            TemplateEngine::new(&addressing, &model, &handler, None, ActiveState::default());

        let out = engine.expand_context("t").unwrap();
        assert_eq!(out.final_text, "<src>\n<src>\n");
        assert_eq!(handler.calls.borrow().len(), 2);
    }

    #[test]
    fn provider_condition_uses_base_id() {
        let (_tmp, root) = repo();
        write(
            &root.join("lg-cfg/t.ctx.md"),
            "{% if provider:com.test %}P{% endif %}",
        );

        let addressing = AddressingContext::new(&root);
        let model = AdaptiveModel::default();
        let handler = RecordingHandler::new();
        let engine = TemplateEngine::new(
            &addressing,
            &model,
            &handler,
            Some("com.test".to_string()),
            ActiveState::default(),
        );
        assert_eq!(engine.expand_context("t").unwrap().final_text, "P");
    }
}

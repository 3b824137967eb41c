//! End-to-end engine scenarios.

use std::fs;
use std::path::Path;

use lg_core::{Engine, EngineError, RunOptions};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// The smallest useful repository: one python file,
/// one section, one context.
fn minimal_repo(root: &Path) {
    write(&root.join("main.py"), "x = 1\n");
    write(
        &root.join("lg-cfg/sections.yaml"),
        "src:\n  extensions: [\".py\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
    );
    write(&root.join("lg-cfg/t.ctx.md"), "# Title\n${src}\n");
}

#[test]
fn minimal_render() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();

    assert!(outcome.text.starts_with("# Title\n"));
    assert!(outcome.text.contains("```python\n"));
    assert!(
        outcome
            .text
            .contains("# \u{2014}\u{2014} FILE: main.py \u{2014}\u{2014}\n")
    );
    assert!(outcome.text.contains("x = 1"));
    assert!(outcome.text.ends_with('\n'));
    assert!(!outcome.text.ends_with("\n\n"));

    // The report carries the context block and the file row.
    let report = outcome.report;
    assert_eq!(report.target, "ctx:t");
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].path, "main.py");
    let context = report.context.unwrap();
    assert_eq!(context.sections_used["src"], 1);
}

#[test]
fn render_twice_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());

    let first = Engine::new(tmp.path(), RunOptions::new())
        .render("t")
        .unwrap();
    let second = Engine::new(tmp.path(), RunOptions::new())
        .render("t")
        .unwrap();
    assert_eq!(first.text, second.text);
}

#[test]
fn section_render_directly() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("sec:src").unwrap();
    assert!(outcome.text.contains("x = 1"));
    assert_eq!(outcome.report.target, "sec:src");
    assert!(outcome.report.context.is_none());
}

#[test]
fn meta_section_render_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());
    write(
        &tmp.path().join("lg-cfg/meta.sec.yaml"),
        "only-meta:\n  tag-sets:\n    x:\n      title: X\n      tags:\n        a: A\n",
    );

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let err = engine.render("sec:only-meta").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Adaptive(lg_adaptive::AdaptiveError::MetaSectionRender { .. })
    ));
}

#[test]
fn unknown_section_lists_searched_keys() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let err = engine.render("sec:ghost").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("ghost"));
    assert!(message.contains("not found"));
}

#[test]
fn conditional_filter_respects_tags() {
    // `__init__.py` appears only when its tag is active.
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("pkg/mod.py"), "m = 1\n");
    write(&tmp.path().join("pkg/__init__.py"), "# init\n");
    write(
        &tmp.path().join("lg-cfg/sections.yaml"),
        r#"
src:
  extensions: [".py"]
  filters:
    mode: allow
    allow: ["/pkg/mod.py"]
    when:
      - condition: "tag:include-inits"
        allow: ["/pkg/__init__.py"]
"#,
    );
    write(&tmp.path().join("lg-cfg/t.ctx.md"), "${src}\n");

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let without = engine.render("t").unwrap();
    assert!(!without.text.contains("__init__.py"));

    let mut options = RunOptions::new();
    options.extra_tags.insert("include-inits".to_string());
    let engine = Engine::new(tmp.path(), options);
    let with_tag = engine.render("t").unwrap();
    assert_eq!(with_tag.text.matches("__init__.py").count(), 1);
}

#[test]
fn template_conditionals_and_modes() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("main.py"), "x = 1\n");
    write(
        &tmp.path().join("lg-cfg/sections.yaml"),
        r#"
src:
  extends: ["ai"]
  extensions: [".py"]
  filters:
    mode: allow
    allow: ["/**"]
"#,
    );
    write(
        &tmp.path().join("lg-cfg/ai.sec.yaml"),
        r#"
ai:
  mode-sets:
    ai-interaction:
      modes:
        ask:
          title: "Ask"
          runs: {"com.test.provider": "--ask"}
        agent:
          title: "Agent"
          tags: [agent]
          runs: {"com.test.provider": "--agent"}
"#,
    );
    write(
        &tmp.path().join("lg-cfg/t.ctx.md"),
        "{% mode ai-interaction:agent %}{% if tag:agent %}AGENT DOCS\n{% endif %}${src}{% endmode %}{% if tag:agent %}LEAKED{% endif %}\n",
    );

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();
    assert!(outcome.text.contains("AGENT DOCS"));
    assert!(outcome.text.contains("x = 1"));
    assert!(!outcome.text.contains("LEAKED"));
}

#[test]
fn doc_only_context_renders_without_fences() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("docs/a.md"), "# A\n\nAlpha.\n");
    write(&tmp.path().join("docs/b.md"), "# B\n\nBeta.\n");
    write(
        &tmp.path().join("lg-cfg/sections.yaml"),
        "docs:\n  extensions: [\".md\"]\n  filters:\n    mode: allow\n    allow: [\"/docs/\"]\n",
    );
    write(&tmp.path().join("lg-cfg/t.ctx.md"), "${docs}\n");

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();
    assert!(!outcome.text.contains("```"));
    assert!(!outcome.text.contains("FILE:"));
    assert!(outcome.text.contains("Alpha."));
    assert!(outcome.text.contains("Beta."));
}

#[test]
fn repeated_section_counts_in_stats() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());
    write(&tmp.path().join("lg-cfg/t.ctx.md"), "${src}\nmiddle\n${src}\n");

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();
    assert_eq!(outcome.text.matches("x = 1").count(), 2);
    let context = outcome.report.context.unwrap();
    assert_eq!(context.sections_used["src"], 2);
    // The file itself still counts once.
    assert_eq!(outcome.report.files.len(), 1);
}

#[test]
fn unknown_mode_set_on_cli_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());

    let mut options = RunOptions::new();
    options
        .modes
        .insert("nope".to_string(), "whatever".to_string());
    let engine = Engine::new(tmp.path(), options);
    let err = engine.render("t").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Adaptive(lg_adaptive::AdaptiveError::UnknownModeSet { .. })
    ));
}

#[test]
fn gitignored_files_stay_out() {
    let tmp = tempfile::tempdir().unwrap();
    minimal_repo(tmp.path());
    write(&tmp.path().join(".gitignore"), "generated/\n");
    write(&tmp.path().join("generated/gen.py"), "g = 1\n");

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();
    assert!(!outcome.text.contains("g = 1"));
}

#[test]
fn cross_scope_markdown_include() {
    // A nested context include pulling in a literal markdown file.
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(
        &root.join("lg-cfg/adaptability/architecture.md"),
        "# Architecture\n\nThe shared story.\n",
    );
    write(&root.join("lg-cfg/sections.yaml"), "placeholder: {}\n");
    write(
        &root.join("vscode/lg-cfg/sections.yaml"),
        "local:\n  extensions: [\".md\"]\n  filters:\n    mode: allow\n    allow: [\"/**\"]\n",
    );
    write(
        &root.join("lg-cfg/combo.ctx.md"),
        "${ctx:wrapped}\n",
    );
    write(
        &root.join("lg-cfg/wrapped.ctx.md"),
        "${md:adaptability/architecture}\n",
    );

    let engine = Engine::new(root, RunOptions::new());
    let outcome = engine.render("combo").unwrap();
    assert!(outcome.text.contains("The shared story."));
}

#[test]
fn python_adapter_options_flow_through() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        &tmp.path().join("m.py"),
        "def f():\n    return 42\n\nTOP = 1\n",
    );
    write(
        &tmp.path().join("lg-cfg/sections.yaml"),
        r#"
src:
  extensions: [".py"]
  python:
    strip_function_bodies: true
  filters:
    mode: allow
    allow: ["/**"]
"#,
    );
    write(&tmp.path().join("lg-cfg/t.ctx.md"), "${src}\n");

    let engine = Engine::new(tmp.path(), RunOptions::new());
    let outcome = engine.render("t").unwrap();
    assert!(outcome.text.contains("def f():"));
    assert!(!outcome.text.contains("return 42"));
    assert!(outcome.text.contains("TOP = 1"));
    // The stripped body shows up in the meta summary.
    assert_eq!(outcome.report.total.meta_summary["py.stripped_bodies"], 1);
}

//! The markdown adapter.
//!
//! Options:
//!
//! - `strip_h1`: drop the document's first H1 line (meta `md.removed_h1`);
//! - `max_heading_level`: clamp deeper headings up to this level (meta
//!   `md.demoted_headings`);
//! - `enable_templating`: process `<!-- lg:if … -->` conditional blocks
//!   and `<!-- lg:comment:start/end -->` stripping against the active
//!   condition context.

use serde_json::{Value, json};

use lg_cond::{ConditionContext, evaluate_text};
use lg_config::Options;

use crate::adapter::{Adapter, AdapterContext, BoundAdapter, Meta};

/// Markdown adapter for `.md`/`.markdown` files.
#[derive(Debug, Default)]
pub struct MarkdownAdapter;

impl Adapter for MarkdownAdapter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".md", ".markdown"]
    }

    fn bind(&self, options: &Options) -> Box<dyn BoundAdapter> {
        Box::new(BoundMarkdown {
            strip_h1: options.get("strip_h1").and_then(Value::as_bool).unwrap_or(false),
            max_heading_level: options
                .get("max_heading_level")
                .and_then(Value::as_u64)
                .map(|l| l.clamp(1, 6) as usize),
            enable_templating: options
                .get("enable_templating")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

struct BoundMarkdown {
    /// Drop the first H1 line.
    strip_h1: bool,
    /// Clamp headings deeper than this level.
    max_heading_level: Option<usize>,
    /// Process `lg:` comment directives.
    enable_templating: bool,
}

impl BoundAdapter for BoundMarkdown {
    fn process(&self, ctx: &AdapterContext<'_>) -> (String, Meta) {
        let mut meta = Meta::new();
        let mut text = ctx.raw_text.to_string();

        if self.enable_templating {
            text = apply_templating(&text, ctx.conditions, &mut meta);
        }

        let mut removed_h1 = 0u64;
        let mut demoted = 0u64;
        let mut out_lines: Vec<String> = Vec::new();
        let mut in_fence = false;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") {
                in_fence = !in_fence;
                out_lines.push(line.to_string());
                continue;
            }
            if in_fence {
                out_lines.push(line.to_string());
                continue;
            }

            let level = heading_level(line);
            if level == 1 && self.strip_h1 && removed_h1 == 0 {
                removed_h1 = 1;
                continue;
            }
            if let Some(max) = self.max_heading_level {
                if level > max {
                    let body = line.trim_start_matches('#').trim_start();
                    out_lines.push(format!("{} {}", "#".repeat(max), body));
                    demoted += 1;
                    continue;
                }
            }
            out_lines.push(line.to_string());
        }

        if removed_h1 > 0 {
            meta.insert("md.removed_h1".to_string(), json!(removed_h1));
        }
        if demoted > 0 {
            meta.insert("md.demoted_headings".to_string(), json!(demoted));
        }

        (out_lines.join("\n"), meta)
    }
}

/// Level of an ATX heading line (0 for non-headings).
fn heading_level(line: &str) -> usize {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes > 0 && hashes <= 6 && line[hashes..].starts_with(' ') {
        hashes
    } else {
        0
    }
}

/// One parsed `lg:` directive.
enum Directive<'a> {
    If(&'a str),
    Elif(&'a str),
    Else,
    EndIf,
    CommentStart,
    CommentEnd,
}

/// Parses a line as an `lg:` HTML-comment directive.
fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("<!--")?.strip_suffix("-->")?.trim();
    if let Some(cond) = inner.strip_prefix("lg:if ") {
        return Some(Directive::If(cond.trim()));
    }
    if let Some(cond) = inner.strip_prefix("lg:elif ") {
        return Some(Directive::Elif(cond.trim()));
    }
    match inner {
        "lg:else" => Some(Directive::Else),
        "lg:endif" => Some(Directive::EndIf),
        "lg:comment:start" => Some(Directive::CommentStart),
        "lg:comment:end" => Some(Directive::CommentEnd),
        _ => None,
    }
}

/// State of one open conditional block.
struct IfFrame {
    /// Whether any branch so far evaluated true.
    taken: bool,
    /// Whether the current branch emits lines.
    emitting: bool,
}

/// Applies `lg:if` blocks and comment stripping, line by line.
///
/// Malformed structure (stray `endif`, unclosed blocks) is logged and the
/// remaining text passes through; a bad document never aborts the run.
fn apply_templating(text: &str, conditions: &ConditionContext, meta: &mut Meta) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut stack: Vec<IfFrame> = Vec::new();
    let mut comment_depth = 0usize;
    let mut removed_blocks = 0u64;

    for line in text.lines() {
        match parse_directive(line) {
            Some(Directive::CommentStart) => {
                comment_depth += 1;
                continue;
            }
            Some(Directive::CommentEnd) => {
                comment_depth = comment_depth.saturating_sub(1);
                continue;
            }
            _ if comment_depth > 0 => continue,
            Some(Directive::If(cond)) => {
                let parent_emitting = stack.last().map(|f| f.emitting).unwrap_or(true);
                let holds = parent_emitting && eval_or_false(cond, conditions);
                if !holds {
                    removed_blocks += 1;
                }
                stack.push(IfFrame {
                    taken: holds,
                    emitting: holds,
                });
                continue;
            }
            Some(Directive::Elif(cond)) => {
                if stack.is_empty() {
                    tracing::warn!("lg:elif without lg:if, line ignored");
                    continue;
                }
                let parent_emitting = stack.len() < 2 || stack[stack.len() - 2].emitting;
                let frame = stack.last_mut().expect("checked non-empty");
                if frame.taken {
                    frame.emitting = false;
                } else {
                    let holds = parent_emitting && eval_or_false(cond, conditions);
                    frame.emitting = holds;
                    frame.taken = holds;
                }
                continue;
            }
            Some(Directive::Else) => {
                if stack.is_empty() {
                    tracing::warn!("lg:else without lg:if, line ignored");
                    continue;
                }
                let parent_emitting = stack.len() < 2 || stack[stack.len() - 2].emitting;
                let frame = stack.last_mut().expect("checked non-empty");
                frame.emitting = parent_emitting && !frame.taken;
                if frame.emitting {
                    frame.taken = true;
                }
                continue;
            }
            Some(Directive::EndIf) => {
                if stack.pop().is_none() {
                    tracing::warn!("lg:endif without lg:if, line ignored");
                }
                continue;
            }
            None => {}
        }

        if stack.iter().all(|f| f.emitting) {
            out.push(line);
        }
    }

    if !stack.is_empty() {
        tracing::warn!(open_blocks = stack.len(), "unclosed lg:if block at end of file");
    }
    if removed_blocks > 0 {
        meta.insert("md.removed_blocks".to_string(), json!(removed_blocks));
    }

    out.join("\n")
}

fn eval_or_false(condition: &str, conditions: &ConditionContext) -> bool {
    match evaluate_text(condition, conditions) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(condition, error = %err, "bad lg:if condition, treating as false");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn run(text: &str, options: Options, tags: &[&str]) -> (String, Meta) {
        let conditions = ConditionContext::with_tags(tags.iter().copied());
        let bound = MarkdownAdapter.bind(&options);
        let ctx = AdapterContext {
            path: Path::new("doc.md"),
            raw_text: text,
            extension: "md",
            group_size: 1,
            mixed: false,
            conditions: &conditions,
        };
        bound.process(&ctx)
    }

    fn opts(pairs: &[(&str, Value)]) -> Options {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn default_is_passthrough() {
        let (text, meta) = run("# Title\n\nBody\n", Options::new(), &[]);
        assert_eq!(text, "# Title\n\nBody");
        assert!(meta.is_empty());
    }

    #[test]
    fn strip_h1_removes_first_heading_only() {
        let (text, meta) = run(
            "# Title\n\nBody\n\n# Another\n",
            opts(&[("strip_h1", json!(true))]),
            &[],
        );
        assert!(!text.contains("# Title"));
        assert!(text.contains("# Another"));
        assert_eq!(meta["md.removed_h1"], json!(1));
    }

    #[test]
    fn deep_headings_clamped() {
        let (text, meta) = run(
            "# T\n\n#### Deep\n\nBody\n",
            opts(&[("max_heading_level", json!(2))]),
            &[],
        );
        assert!(text.contains("## Deep"));
        assert!(!text.contains("#### Deep"));
        assert_eq!(meta["md.demoted_headings"], json!(1));
    }

    #[test]
    fn conditional_blocks_follow_tags() {
        let doc = "\
# Doc

<!-- lg:if tag:python -->
## Python Setup
pip install
<!-- lg:endif -->

<!-- lg:if tag:ts -->
## TS Setup
npm install
<!-- lg:endif -->

Always here.
";
        let options = opts(&[("enable_templating", json!(true))]);

        let (none, _) = run(doc, options.clone(), &[]);
        assert!(!none.contains("Python Setup"));
        assert!(!none.contains("TS Setup"));
        assert!(none.contains("Always here."));

        let (python, _) = run(doc, options.clone(), &["python"]);
        assert!(python.contains("pip install"));
        assert!(!python.contains("npm install"));

        let (ts, _) = run(doc, options, &["ts"]);
        assert!(ts.contains("npm install"));
        assert!(!ts.contains("pip install"));
    }

    #[test]
    fn elif_and_else_chains() {
        let doc = "\
<!-- lg:if tag:a -->
branch a
<!-- lg:elif tag:b -->
branch b
<!-- lg:else -->
branch default
<!-- lg:endif -->
";
        let options = opts(&[("enable_templating", json!(true))]);
        assert!(run(doc, options.clone(), &["a"]).0.contains("branch a"));
        let b = run(doc, options.clone(), &["b"]).0;
        assert!(b.contains("branch b"));
        assert!(!b.contains("branch a"));
        let default = run(doc, options, &[]).0;
        assert!(default.contains("branch default"));
        assert!(!default.contains("branch b"));
    }

    #[test]
    fn nested_conditionals() {
        let doc = "\
<!-- lg:if tag:outer -->
outer text
<!-- lg:if tag:inner -->
inner text
<!-- lg:endif -->
<!-- lg:endif -->
";
        let options = opts(&[("enable_templating", json!(true))]);
        let both = run(doc, options.clone(), &["outer", "inner"]).0;
        assert!(both.contains("outer text") && both.contains("inner text"));
        let outer_only = run(doc, options.clone(), &["outer"]).0;
        assert!(outer_only.contains("outer text") && !outer_only.contains("inner text"));
        // Inner tag without outer: nothing emits.
        let inner_only = run(doc, options, &["inner"]).0;
        assert!(!inner_only.contains("inner text"));
    }

    #[test]
    fn comment_blocks_stripped() {
        let doc = "\
keep
<!-- lg:comment:start -->
instructions for authors
<!-- lg:comment:end -->
also keep
";
        let options = opts(&[("enable_templating", json!(true))]);
        let out = run(doc, options, &[]).0;
        assert!(out.contains("keep"));
        assert!(out.contains("also keep"));
        assert!(!out.contains("instructions"));
    }

    #[test]
    fn templating_off_leaves_directives_alone() {
        let doc = "<!-- lg:if tag:x -->\nhidden\n<!-- lg:endif -->\n";
        let out = run(doc, Options::new(), &[]).0;
        assert!(out.contains("<!-- lg:if tag:x -->"));
        assert!(out.contains("hidden"));
    }

    #[test]
    fn stray_endif_is_tolerated() {
        let doc = "text\n<!-- lg:endif -->\nmore\n";
        let options = opts(&[("enable_templating", json!(true))]);
        let out = run(doc, options, &[]).0;
        assert!(out.contains("text"));
        assert!(out.contains("more"));
    }

    #[test]
    fn fenced_code_not_treated_as_headings() {
        let doc = "# T\n```\n# not a heading\n#### also not\n```\n";
        let (out, meta) = run(doc, opts(&[("max_heading_level", json!(2))]), &[]);
        assert!(out.contains("# not a heading"));
        assert!(out.contains("#### also not"));
        assert!(meta.get("md.demoted_headings").is_none());
    }
}

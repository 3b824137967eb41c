//! The Python adapter.
//!
//! Options:
//!
//! - `skip_trivial_inits`: drop `__init__.py` files that carry no code
//!   (only blank lines, comments, or a module docstring);
//! - `strip_function_bodies`: replace function bodies with an ellipsis
//!   stub, preserving the signature and a leading docstring (meta
//!   `py.stripped_bodies`).

use serde_json::{Value, json};

use lg_config::Options;

use crate::adapter::{Adapter, AdapterContext, BoundAdapter, Meta};

/// Python adapter for `.py` files.
#[derive(Debug, Default)]
pub struct PythonAdapter;

impl Adapter for PythonAdapter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".py"]
    }

    fn bind(&self, options: &Options) -> Box<dyn BoundAdapter> {
        Box::new(BoundPython {
            skip_trivial_inits: options
                .get("skip_trivial_inits")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            strip_function_bodies: options
                .get("strip_function_bodies")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

struct BoundPython {
    /// Drop contentless `__init__.py` files.
    skip_trivial_inits: bool,
    /// Replace function bodies with `...`.
    strip_function_bodies: bool,
}

impl BoundAdapter for BoundPython {
    fn should_skip(&self, ctx: &AdapterContext<'_>) -> bool {
        self.skip_trivial_inits
            && ctx.path.file_name().is_some_and(|n| n == "__init__.py")
            && is_trivial_module(ctx.raw_text)
    }

    fn process(&self, ctx: &AdapterContext<'_>) -> (String, Meta) {
        let mut meta = Meta::new();
        if !self.strip_function_bodies {
            return (ctx.raw_text.to_string(), meta);
        }
        let (text, stripped) = strip_function_bodies(ctx.raw_text);
        if stripped > 0 {
            meta.insert("py.stripped_bodies".to_string(), json!(stripped));
        }
        (text, meta)
    }
}

/// Whether a module consists only of blank lines, comments, and an optional
/// module docstring.
fn is_trivial_module(text: &str) -> bool {
    let mut in_docstring: Option<&str> = None;
    let mut seen_docstring = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(delim) = in_docstring {
            if trimmed.ends_with(delim) {
                in_docstring = None;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for delim in ["\"\"\"", "'''"] {
            if trimmed.starts_with(delim) && !seen_docstring {
                seen_docstring = true;
                let rest = &trimmed[delim.len()..];
                if !(rest.len() >= delim.len() && rest.ends_with(delim)) {
                    in_docstring = Some(delim);
                }
                break;
            }
        }
        if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
            continue;
        }
        return false;
    }
    true
}

/// Line-based body stripping: after a `def` header, keep an immediate
/// docstring and replace the rest of the indented body with `...`.
fn strip_function_bodies(text: &str) -> (String, u64) {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut stripped = 0u64;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim_start();

        let is_def = trimmed.starts_with("def ") || trimmed.starts_with("async def ");
        out.push(line.to_string());
        i += 1;
        if !is_def {
            continue;
        }

        // Multi-line signatures: keep emitting until the header's colon.
        let mut header_done = line.trim_end().ends_with(':');
        while !header_done && i < lines.len() {
            out.push(lines[i].to_string());
            header_done = lines[i].trim_end().ends_with(':');
            i += 1;
        }

        // Keep an immediate docstring.
        let body_indent = indent + 4;
        if i < lines.len() {
            let first_body = lines[i].trim_start();
            for delim in ["\"\"\"", "'''"] {
                if first_body.starts_with(delim) {
                    out.push(lines[i].to_string());
                    let rest = &first_body[delim.len()..];
                    let closed = rest.len() >= delim.len() && rest.ends_with(delim);
                    i += 1;
                    if !closed {
                        while i < lines.len() {
                            out.push(lines[i].to_string());
                            let done = lines[i].trim_end().ends_with(delim);
                            i += 1;
                            if done {
                                break;
                            }
                        }
                    }
                    break;
                }
            }
        }

        // Swallow the remaining body lines.
        let mut swallowed = false;
        while i < lines.len() {
            let body_line = lines[i];
            if body_line.trim().is_empty() {
                // Blank lines inside the body are swallowed with it, but a
                // trailing blank before a dedent stays with the outer level.
                if lines[i + 1..]
                    .iter()
                    .find(|l| !l.trim().is_empty())
                    .map(|l| l.len() - l.trim_start().len() >= body_indent)
                    .unwrap_or(false)
                {
                    i += 1;
                    continue;
                }
                break;
            }
            let line_indent = body_line.len() - body_line.trim_start().len();
            if line_indent < body_indent {
                break;
            }
            swallowed = true;
            i += 1;
        }
        if swallowed {
            out.push(format!("{}...", " ".repeat(body_indent)));
            stripped += 1;
        }
    }

    let mut text = out.join("\n");
    if !text.ends_with('\n') {
        text.push('\n');
    }
    (text, stripped)
}

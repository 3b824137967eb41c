//! The template AST.

/// What kind of file an include placeholder pulls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `${tpl:…}`: a sub-template, recursively expanded.
    Template,
    /// `${ctx:…}`: a context file, recursively expanded minus its
    /// frontmatter.
    Context,
    /// `${md:…}`: a markdown file included literally.
    Markdown,
}

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text.
    Text(String),
    /// A section placeholder (`${name}` / `$name`), possibly addressed.
    Section(String),
    /// A file include.
    Include {
        /// What to include.
        kind: IncludeKind,
        /// The reference after the kind prefix (may carry `@origin:`).
        reference: String,
    },
    /// A conditional block.
    If {
        /// `(condition, body)` pairs: the `if` branch first, then each
        /// `elif`, in order.
        branches: Vec<(String, Vec<TemplateNode>)>,
        /// The `else` body, when present.
        else_body: Option<Vec<TemplateNode>>,
    },
    /// A `{% mode set:mode %}` block.
    Mode {
        /// Mode-set id.
        set: String,
        /// Mode id.
        mode: String,
        /// Block body.
        body: Vec<TemplateNode>,
    },
}

/// A parsed template, cached per (path, mtime).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTemplate {
    /// Top-level nodes.
    pub nodes: Vec<TemplateNode>,
    /// How many blocks were still open at end of input (auto-closed).
    ///
    /// Zero for well-formed templates. The evaluator treats a non-zero
    /// count as fatal at the top level and as a warning inside nested
    /// includes.
    pub unclosed_blocks: usize,
}

//! Reference parsing.

use crate::error::AddressingError;

/// How references of one resource type are parsed and resolved.
///
/// Each placeholder kind (section, template, context, markdown) supplies its
/// own config; the addressing layer stays generic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Resource kind name, for error messages (`"section"`, `"tpl"`, …).
    pub name: &'static str,
    /// File extension appended when missing (`".tpl.md"`); `None` for
    /// resources that are not files.
    pub extension: Option<&'static str>,
    /// Whether `#anchor` and `,param` suffixes are split off before
    /// resolving (markdown includes).
    pub strip_md_syntax: bool,
    /// Whether paths resolve relative to the scope directory itself rather
    /// than its `lg-cfg/`.
    pub resolve_outside_cfg: bool,
    /// Whether this reference names a section (resolved via the store, not
    /// the filesystem).
    pub is_section: bool,
}

impl ResourceConfig {
    /// Config for section references.
    pub fn section() -> Self {
        Self {
            name: "section",
            extension: None,
            strip_md_syntax: false,
            resolve_outside_cfg: false,
            is_section: true,
        }
    }

    /// Config for sub-template includes (`${tpl:…}`).
    pub fn template() -> Self {
        Self {
            name: "tpl",
            extension: Some(".tpl.md"),
            strip_md_syntax: false,
            resolve_outside_cfg: false,
            is_section: false,
        }
    }

    /// Config for context includes (`${ctx:…}`).
    pub fn context() -> Self {
        Self {
            name: "ctx",
            extension: Some(".ctx.md"),
            strip_md_syntax: false,
            resolve_outside_cfg: false,
            is_section: false,
        }
    }

    /// Config for literal markdown includes (`${md:…}`).
    pub fn markdown() -> Self {
        Self {
            name: "md",
            extension: Some(".md"),
            strip_md_syntax: true,
            resolve_outside_cfg: true,
            is_section: false,
        }
    }
}

/// A reference parsed into its parts, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Origin as written (`".."`, `"apps/web"`); `None` when implicit,
    /// `Some("")` for the repository root (`@:` / `@/:`).
    pub origin: Option<String>,
    /// Whether `@` was written explicitly.
    pub origin_explicit: bool,
    /// The path part, without anchor/params.
    pub path: String,
    /// Whether the path started with `/` (anchored at the lg-cfg root).
    pub is_absolute: bool,
    /// `#anchor` suffix, when the resource config strips markdown syntax.
    pub anchor: Option<String>,
    /// `,param` suffixes, in order.
    pub params: Vec<String>,
}

/// Parses a reference string according to a resource config.
pub fn parse(reference: &str, config: &ResourceConfig) -> Result<ParsedPath, AddressingError> {
    let invalid = |message: &str| AddressingError::InvalidReference {
        reference: reference.to_string(),
        message: message.to_string(),
    };

    let (origin, origin_explicit, rest) = if let Some(after_at) = reference.strip_prefix('@') {
        if let Some(bracketed) = after_at.strip_prefix('[') {
            let Some(close) = bracketed.find("]:") else {
                return Err(invalid("missing ']:' in bracketed origin"));
            };
            let origin = &bracketed[..close];
            let rest = &bracketed[close + 2..];
            (Some(origin.to_string()), true, rest)
        } else {
            let Some((origin, rest)) = after_at.split_once(':') else {
                return Err(invalid("missing ':' after origin"));
            };
            (Some(origin.to_string()), true, rest)
        }
    } else {
        (None, false, reference)
    };

    // `@/:name` and `@:name` both mean the repository root.
    let origin = origin.map(|o| if o == "/" { String::new() } else { o });

    if rest.is_empty() {
        return Err(invalid("empty path"));
    }

    let (mut path, anchor, params) = if config.strip_md_syntax {
        split_md_syntax(rest)
    } else {
        (rest.to_string(), None, Vec::new())
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }

    let is_absolute = path.starts_with('/');
    if is_absolute {
        path = path.trim_start_matches('/').to_string();
        if path.is_empty() {
            return Err(invalid("empty path"));
        }
    }

    Ok(ParsedPath {
        origin,
        origin_explicit,
        path,
        is_absolute,
        anchor,
        params,
    })
}

/// Splits `path#anchor,param1,param2` into its parts.
fn split_md_syntax(text: &str) -> (String, Option<String>, Vec<String>) {
    // Params first: everything after the first ',' is a param list.
    let (before_params, params) = match text.split_once(',') {
        Some((head, tail)) => (
            head,
            tail.split(',').map(|p| p.trim().to_string()).collect(),
        ),
        None => (text, Vec::new()),
    };
    match before_params.split_once('#') {
        Some((path, anchor)) => (path.to_string(), Some(anchor.to_string()), params),
        None => (before_params.to_string(), None, params),
    }
}

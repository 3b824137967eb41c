//! File-resource resolution.

use std::path::{Component, Path, PathBuf};

use lg_path::{is_scope, join_posix, rel_posix};

use crate::context::AddressingContext;
use crate::error::AddressingError;
use crate::parse::{ParsedPath, ResourceConfig};

/// A file resource (template, context, markdown) resolved to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Scope directory (parent of its `lg-cfg/`).
    pub scope_dir: PathBuf,
    /// Scope path relative to the repository root ("" for the root).
    pub scope_rel: String,
    /// The scope's `lg-cfg/` directory.
    pub cfg_root: PathBuf,
    /// Absolute path of the resource file.
    pub resource_path: PathBuf,
    /// Resource path relative to its resolution base (lg-cfg/ or the scope
    /// directory, per the resource config).
    pub resource_rel: String,
}

/// Lexically normalises a path: collapses `.` and `..` without touching the
/// filesystem (targets may not exist yet).
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

/// Resolves an origin string to a scope directory and its repo-relative
/// path.
///
/// An empty origin is the repository root; anything else is a path relative
/// to the current scope directory. Origins may climb with `..` but must not
/// leave the repository.
pub fn resolve_origin(
    origin: &str,
    ctx: &AddressingContext,
) -> Result<(PathBuf, String), AddressingError> {
    if origin.is_empty() {
        return Ok((ctx.repo_root().to_path_buf(), String::new()));
    }

    let current_scope = ctx
        .current()
        .cfg_root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.repo_root().to_path_buf());
    let scope_dir = normalize(&current_scope.join(origin));

    let Some(scope_rel) = rel_posix(&scope_dir, ctx.repo_root()) else {
        return Err(AddressingError::PathEscapesScope {
            path: origin.to_string(),
            scope_dir: ctx.repo_root().to_path_buf(),
        });
    };
    Ok((scope_dir, scope_rel))
}

/// Resolves a parsed file reference to an absolute location.
///
/// The resolution base is the scope's `lg-cfg/` (or the scope directory
/// itself for `resolve_outside_cfg` resources); relative paths additionally
/// start from the current directory of the innermost frame, unless the
/// origin was explicit (a fresh scope starts at its root).
pub fn resolve_file(
    parsed: &ParsedPath,
    config: &ResourceConfig,
    ctx: &AddressingContext,
) -> Result<ResolvedFile, AddressingError> {
    let frame = ctx.current();

    let (scope_dir, scope_rel, cfg_root) = match &parsed.origin {
        Some(origin) => {
            let (scope_dir, scope_rel) = resolve_origin(origin, ctx)?;
            let cfg = lg_path::cfg_root(&scope_dir);
            (scope_dir, scope_rel, cfg)
        }
        None => {
            let cfg = frame.cfg_root.clone();
            let scope_dir = cfg
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| ctx.repo_root().to_path_buf());
            let scope_rel = rel_posix(&scope_dir, ctx.repo_root()).unwrap_or_default();
            (scope_dir, scope_rel, cfg)
        }
    };

    // The target must be a scope: every resource resolves from its lg-cfg/.
    if !is_scope(&scope_dir) {
        return Err(AddressingError::ScopeNotFound {
            origin: parsed.origin.clone().unwrap_or_default(),
            scope_dir,
        });
    }

    // Relative references start at the frame's current directory, but only
    // within the same scope: an explicit origin lands at the scope root.
    let current_dir = if parsed.origin_explicit || parsed.is_absolute {
        ""
    } else {
        frame.current_dir.as_str()
    };

    let mut rel = join_posix(current_dir, &parsed.path);
    if let Some(ext) = config.extension {
        if !rel.ends_with(ext) {
            rel.push_str(ext);
        }
    }

    let resource_path = normalize(&cfg_root.join(&rel));

    // Containment boundary: lg-cfg/ for ordinary resources; the scope
    // directory for resources allowed to climb out of lg-cfg/ (markdown
    // includes such as `md:../docs/guide`).
    let boundary = if config.resolve_outside_cfg {
        &scope_dir
    } else {
        &cfg_root
    };
    if rel_posix(&resource_path, boundary).is_none() {
        return Err(AddressingError::PathEscapesScope {
            path: rel,
            scope_dir,
        });
    }
    let resource_rel = rel_posix(&resource_path, &cfg_root)
        .unwrap_or_else(|| resource_path.to_string_lossy().into_owned());

    Ok(ResolvedFile {
        scope_dir,
        scope_rel,
        cfg_root,
        resource_path,
        resource_rel,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::parse::parse;

    use super::*;

    /// Lays out a two-scope repository and returns (tmp, root).
    fn repo() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("lg-cfg/adaptability")).unwrap();
        fs::create_dir_all(root.join("cli/lg-cfg/docs/en")).unwrap();
        fs::create_dir_all(root.join("vscode/lg-cfg")).unwrap();
        (tmp, root)
    }

    #[test]
    fn local_template_resolves_in_cfg() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        let parsed = parse("inner", &ResourceConfig::template()).unwrap();
        let resolved = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap();
        assert_eq!(resolved.resource_path, root.join("lg-cfg/inner.tpl.md"));
        assert_eq!(resolved.resource_rel, "inner.tpl.md");
        assert_eq!(resolved.scope_rel, "");
    }

    #[test]
    fn relative_reference_uses_current_dir() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        ctx.push_file(&root.join("lg-cfg"), "adaptability/_.ctx.md", None);
        let parsed = parse("part", &ResourceConfig::template()).unwrap();
        let resolved = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap();
        assert_eq!(
            resolved.resource_path,
            root.join("lg-cfg/adaptability/part.tpl.md")
        );
    }

    #[test]
    fn absolute_reference_ignores_current_dir() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        ctx.push_file(&root.join("lg-cfg"), "adaptability/_.ctx.md", None);
        let parsed = parse("/part", &ResourceConfig::template()).unwrap();
        let resolved = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap();
        assert_eq!(resolved.resource_path, root.join("lg-cfg/part.tpl.md"));
    }

    #[test]
    fn cross_scope_markdown_from_child() {
        // A child-scope context referencing md@.. reaches the repo root.
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        ctx.push_file(&root.join("vscode/lg-cfg"), "_.ctx.md", Some("vscode".into()));

        let config = ResourceConfig::markdown();
        let parsed = parse("@..:adaptability/architecture", &config).unwrap();
        let resolved = resolve_file(&parsed, &config, &ctx).unwrap();
        assert_eq!(
            resolved.resource_path,
            root.join("lg-cfg/adaptability/architecture.md")
        );
        assert_eq!(resolved.scope_rel, "");

        // And md@../cli:docs/en/adaptability → cli scope.
        let parsed = parse("@../cli:docs/en/adaptability", &config).unwrap();
        let resolved = resolve_file(&parsed, &config, &ctx).unwrap();
        assert_eq!(
            resolved.resource_path,
            root.join("cli/lg-cfg/docs/en/adaptability.md")
        );
        assert_eq!(resolved.scope_rel, "cli");
    }

    #[test]
    fn origin_must_stay_inside_repo() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        let parsed = parse("@../../../etc:passwd", &ResourceConfig::template()).unwrap();
        let err = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap_err();
        assert!(matches!(err, AddressingError::PathEscapesScope { .. }));
    }

    #[test]
    fn path_must_stay_inside_scope() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        let parsed = parse("../../outside", &ResourceConfig::template()).unwrap();
        let err = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap_err();
        assert!(matches!(err, AddressingError::PathEscapesScope { .. }));
    }

    #[test]
    fn markdown_may_leave_cfg_but_not_scope() {
        let (_tmp, root) = repo();
        fs::create_dir_all(root.join("docs")).unwrap();
        let ctx = AddressingContext::new(&root);
        let config = ResourceConfig::markdown();

        // ../docs/guide climbs out of lg-cfg/ but stays in the scope.
        let parsed = parse("../docs/guide", &config).unwrap();
        let resolved = resolve_file(&parsed, &config, &ctx).unwrap();
        assert_eq!(resolved.resource_path, root.join("docs/guide.md"));

        // Templates may not leave lg-cfg/.
        let parsed = parse("../docs/guide", &ResourceConfig::template()).unwrap();
        let err = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap_err();
        assert!(matches!(err, AddressingError::PathEscapesScope { .. }));

        // Not even markdown may leave the scope itself.
        let parsed = parse("../../outside", &config).unwrap();
        let err = resolve_file(&parsed, &config, &ctx).unwrap_err();
        assert!(matches!(err, AddressingError::PathEscapesScope { .. }));
    }

    #[test]
    fn missing_scope_detected() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        let parsed = parse("@nothere:x", &ResourceConfig::template()).unwrap();
        let err = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap_err();
        assert!(matches!(err, AddressingError::ScopeNotFound { .. }));
    }

    #[test]
    fn extension_not_doubled() {
        let (_tmp, root) = repo();
        let ctx = AddressingContext::new(&root);
        let parsed = parse("inner.tpl.md", &ResourceConfig::template()).unwrap();
        let resolved = resolve_file(&parsed, &ResourceConfig::template(), &ctx).unwrap();
        assert_eq!(resolved.resource_path, root.join("lg-cfg/inner.tpl.md"));
    }
}

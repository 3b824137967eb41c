//! The hierarchical filter engine.
//!
//! A [`FilterEngine`] is compiled from an *effective* filter tree: one
//! whose conditional overlays have already been folded in by the manifest
//! builder. Patterns at each node are evaluated against paths relative to
//! that node's subtree root:
//!
//! - a leading `/` anchors the pattern at the node root;
//! - a trailing `/` means the whole directory subtree (`dir/**`);
//! - a non-anchored pattern `P` matches both `P` and `**/P`.

use globset::{Glob, GlobSet, GlobSetBuilder};

use lg_config::{FilterMode, FilterNode};
use lg_path::split_components;

/// A pattern in normalised, component-split form (for descend checks).
#[derive(Debug, Clone)]
struct PatternShape {
    /// Pattern components after normalisation.
    components: Vec<String>,
    /// Whether the pattern was anchored with a leading `/`.
    anchored: bool,
}

/// One compiled node of the filter tree.
#[derive(Debug)]
struct CompiledNode {
    /// Effective mode (inheritance already applied).
    mode: FilterMode,
    /// Compiled allow patterns.
    allow: GlobSet,
    /// Compiled block patterns.
    block: GlobSet,
    /// Allow patterns in shape form, for `may_descend`.
    allow_shapes: Vec<PatternShape>,
    /// Child nodes keyed by directory component.
    children: Vec<(String, CompiledNode)>,
}

/// Compiled filter tree with `includes` / `may_descend` primitives.
#[derive(Debug)]
pub struct FilterEngine {
    /// Root node.
    root: CompiledNode,
}

/// Normalises one pattern into the glob strings to compile.
fn glob_variants(pattern: &str) -> (Vec<String>, PatternShape) {
    let anchored = pattern.starts_with('/');
    let mut body = pattern.trim_start_matches('/').to_string();
    if body.ends_with('/') {
        body.push_str("**");
    }

    let mut variants = vec![body.clone()];
    if !anchored {
        variants.push(format!("**/{body}"));
    }

    let shape = PatternShape {
        components: split_components(&body).map(String::from).collect(),
        anchored,
    };
    (variants, shape)
}

fn compile_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let (variants, _) = glob_variants(pattern);
        for variant in variants {
            builder.add(Glob::new(&variant)?);
        }
    }
    builder.build()
}

fn compile_node(node: &FilterNode, inherited: FilterMode) -> Result<CompiledNode, globset::Error> {
    let mode = node.mode.unwrap_or(inherited);
    let allow_shapes = node
        .allow
        .iter()
        .map(|p| glob_variants(p).1)
        .collect::<Vec<_>>();
    let mut children = Vec::new();
    for (name, child) in &node.children {
        children.push((name.clone(), compile_node(child, mode)?));
    }
    Ok(CompiledNode {
        mode,
        allow: compile_globset(&node.allow)?,
        block: compile_globset(&node.block)?,
        allow_shapes,
        children,
    })
}

/// Matches one path component against one pattern component (`*`, `?`).
fn component_matches(pattern: &str, component: &str) -> bool {
    if pattern == "**" {
        return true;
    }
    // Tiny backtracking matcher over a single component.
    fn matches(p: &[u8], c: &[u8]) -> bool {
        match (p.first(), c.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&p[1..], c) || (!c.is_empty() && matches(p, &c[1..]))
            }
            (Some(b'?'), Some(_)) => matches(&p[1..], &c[1..]),
            (Some(a), Some(b)) if a == b => matches(&p[1..], &c[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), component.as_bytes())
}

impl CompiledNode {
    /// Whether a descendant of `dir` (components) could match an allow
    /// pattern of this shape.
    fn shape_admits_descent(shape: &PatternShape, dir: &[&str]) -> bool {
        if !shape.anchored {
            // Non-anchored patterns float to any depth.
            return true;
        }
        for (i, dir_comp) in dir.iter().enumerate() {
            match shape.components.get(i) {
                Some(comp) if comp == "**" => return true,
                Some(comp) if component_matches(comp, dir_comp) => {}
                // Pattern exhausted before the directory: the pattern can
                // only match files *above* this directory.
                _ => return false,
            }
        }
        // All directory components matched a pattern prefix; anything
        // deeper can still complete the match.
        true
    }

    fn includes(&self, components: &[&str], full: &str) -> bool {
        if components.len() > 1 {
            if let Some((_, child)) = self
                .children
                .iter()
                .find(|(name, _)| name == components[0])
            {
                let remainder = &full[components[0].len() + 1..];
                return child.includes(&components[1..], remainder);
            }
        }

        let allowed = self.allow.is_match(full);
        let blocked = self.block.is_match(full);
        match self.mode {
            FilterMode::Allow => allowed && !blocked,
            FilterMode::Block => allowed || !blocked,
        }
    }

    fn may_descend(&self, components: &[&str], full: &str) -> bool {
        if components.is_empty() {
            return true;
        }

        // A directory that coincides with a child node must be entered so
        // the child's own rules can speak.
        if let Some((_, child)) = self
            .children
            .iter()
            .find(|(name, _)| name == components[0])
        {
            if components.len() == 1 {
                return true;
            }
            let remainder = &full[components[0].len() + 1..];
            if child.may_descend(&components[1..], remainder) {
                return true;
            }
            // Fall through: patterns at this node may still admit paths
            // under the child directory.
        }

        match self.mode {
            // Default-allow: unmatched files are included, so descent can
            // never be pruned.
            FilterMode::Block => true,
            FilterMode::Allow => self
                .allow_shapes
                .iter()
                .any(|shape| Self::shape_admits_descent(shape, components)),
        }
    }
}

impl FilterEngine {
    /// Compiles an effective filter tree.
    ///
    /// The root defaults to allow mode when unspecified.
    pub fn compile(tree: &FilterNode) -> Result<Self, globset::Error> {
        Ok(Self {
            root: compile_node(tree, FilterMode::Allow)?,
        })
    }

    /// Whether a file path (POSIX, relative to the tree root) is included.
    pub fn includes(&self, rel_path: &str) -> bool {
        if rel_path.is_empty() {
            return false;
        }
        let components: Vec<&str> = split_components(rel_path).collect();
        self.root.includes(&components, rel_path)
    }

    /// Whether any pattern could match a descendant of `rel_dir`, used
    /// for early directory pruning. Monotone with [`Self::includes`]: a
    /// directory on the path of any included file always admits descent.
    pub fn may_descend(&self, rel_dir: &str) -> bool {
        if rel_dir.is_empty() {
            return true;
        }
        let components: Vec<&str> = split_components(rel_dir).collect();
        self.root.may_descend(&components, rel_dir)
    }
}

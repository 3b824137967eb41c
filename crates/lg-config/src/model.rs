//! The section configuration data model.
//!
//! Section YAML is duck-typed: structural keys (`extends`, `extensions`,
//! `filters`, …) are interpreted by the engine, and every other mapping key
//! is an adapter configuration. Parsing therefore walks `serde_yaml`
//! values by hand rather than deriving.

use std::collections::BTreeMap;

use serde_json::Value as Json;
use serde_yaml::Value as Yaml;

use crate::value::yaml_to_json;

/// Opaque adapter options: name → JSON value.
pub type Options = BTreeMap<String, Json>;

/// Default policy of a filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Only paths matching an allow pattern are included.
    Allow,
    /// Paths are included unless a block pattern matches (default-allow).
    Block,
}

/// A conditional allow/block overlay on a filter node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalFilter {
    /// Condition source text, evaluated at manifest time.
    pub condition: String,
    /// Extra allow patterns when the condition holds.
    pub allow: Vec<String>,
    /// Extra block patterns when the condition holds.
    pub block: Vec<String>,
}

/// One node of the hierarchical allow/block tree.
///
/// Patterns are evaluated against paths relative to this node's subtree
/// root. A node without an explicit mode inherits its parent's effective
/// mode at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterNode {
    /// Explicit mode, if declared.
    pub mode: Option<FilterMode>,
    /// Allow patterns (POSIX globs; leading `/` anchors at this node).
    pub allow: Vec<String>,
    /// Block patterns.
    pub block: Vec<String>,
    /// Conditional overlays, in declaration order.
    pub when: Vec<ConditionalFilter>,
    /// Child nodes keyed by directory component.
    pub children: BTreeMap<String, FilterNode>,
}

/// One conditional option patch inside an adapter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalOptions {
    /// Condition source text.
    pub condition: String,
    /// Options applied when the condition holds (later patches win).
    pub options: Options,
}

/// Configuration of one adapter within a section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterConfig {
    /// Unconditional options.
    pub base_options: Options,
    /// Ordered conditional patches.
    pub conditional_options: Vec<ConditionalOptions>,
}

/// A per-path adapter override rule from the section's `targets` list.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRule {
    /// Glob patterns the rule applies to.
    pub patterns: Vec<String>,
    /// Adapter name → option patch.
    pub adapter_patches: BTreeMap<String, Options>,
}

/// How file labels are rendered in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathLabelMode {
    /// Strip the current origin prefix when present; otherwise relative.
    #[default]
    ScopeRelative,
    /// The full repository-relative path.
    Relative,
    /// The shortest unique suffix across the section's files.
    Basename,
}

/// Adapter-level empty-file policy (`empty_policy` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Follow the section's `skip_empty` setting.
    #[default]
    Inherit,
    /// Always include empty files.
    Include,
    /// Always exclude empty files.
    Exclude,
}

impl EmptyPolicy {
    /// Reads the policy out of a final adapter option map.
    pub fn from_options(options: &Options) -> Self {
        match options.get("empty_policy").and_then(Json::as_str) {
            Some("include") => Self::Include,
            Some("exclude") => Self::Exclude,
            _ => Self::Inherit,
        }
    }
}

/// A parsed section definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionConfig {
    /// Local name (index key without directory prefix).
    pub name: String,
    /// Ordered parent references for inheritance.
    pub extends: Vec<String>,
    /// Lowercase file extensions including the leading dot, first-seen order.
    pub extensions: Vec<String>,
    /// Filter tree; `None` makes this a meta-section.
    pub filters: Option<FilterNode>,
    /// Adapter configurations keyed by adapter name.
    pub adapters: BTreeMap<String, AdapterConfig>,
    /// Per-path adapter override rules, in declaration order.
    pub targets: Vec<TargetRule>,
    /// Raw `mode-sets` mapping, parsed later by the adaptive layer.
    pub mode_sets_raw: BTreeMap<String, Yaml>,
    /// Raw `tag-sets` mapping, parsed later by the adaptive layer.
    pub tag_sets_raw: BTreeMap<String, Yaml>,
    /// Label mode for rendered file markers.
    pub path_labels: PathLabelMode,
    /// Whether empty files are skipped by default.
    pub skip_empty: bool,
    /// Whether this section may be rendered inside code fences.
    pub code_fence: bool,
}

impl SectionConfig {
    /// A meta-section has no filter tree: it can only be used through
    /// `extends` and frontmatter includes, never rendered.
    pub fn is_meta(&self) -> bool {
        self.filters.is_none()
    }

    /// Parses a section definition from its YAML mapping.
    pub fn from_yaml(name: &str, node: &Yaml) -> Result<Self, String> {
        let map = node
            .as_mapping()
            .ok_or_else(|| "section must be a mapping".to_string())?;

        let mut section = Self {
            name: name.to_string(),
            skip_empty: true,
            code_fence: true,
            ..Self::default()
        };

        for (key, value) in map {
            let Some(key) = key.as_str() else {
                return Err("section keys must be strings".to_string());
            };
            match key {
                "extends" => section.extends = string_list(value, "extends")?,
                "extensions" => {
                    section.extensions = string_list(value, "extensions")?
                        .into_iter()
                        .map(|e| e.to_ascii_lowercase())
                        .collect();
                }
                "filters" => section.filters = Some(parse_filter_node(value)?),
                "targets" => section.targets = parse_targets(value)?,
                "mode-sets" => section.mode_sets_raw = raw_mapping(value, "mode-sets")?,
                "tag-sets" => section.tag_sets_raw = raw_mapping(value, "tag-sets")?,
                "path_labels" => {
                    section.path_labels = parse_path_labels(value)?;
                }
                "skip_empty" => {
                    section.skip_empty = value
                        .as_bool()
                        .ok_or_else(|| "skip_empty must be a boolean".to_string())?;
                }
                "code_fence" => {
                    section.code_fence = value
                        .as_bool()
                        .ok_or_else(|| "code_fence must be a boolean".to_string())?;
                }
                adapter_name => {
                    let config = parse_adapter_config(value)
                        .map_err(|e| format!("adapter '{adapter_name}': {e}"))?;
                    section.adapters.insert(adapter_name.to_string(), config);
                }
            }
        }

        Ok(section)
    }
}

fn string_list(value: &Yaml, what: &str) -> Result<Vec<String>, String> {
    match value {
        Yaml::String(s) => Ok(vec![s.clone()]),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| format!("{what} entries must be strings"))
            })
            .collect(),
        Yaml::Null => Ok(Vec::new()),
        _ => Err(format!("{what} must be a string or list of strings")),
    }
}

fn raw_mapping(value: &Yaml, what: &str) -> Result<BTreeMap<String, Yaml>, String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| format!("{what} must be a mapping"))?;
    let mut out = BTreeMap::new();
    for (key, val) in map {
        let key = key
            .as_str()
            .ok_or_else(|| format!("{what} keys must be strings"))?;
        out.insert(key.to_string(), val.clone());
    }
    Ok(out)
}

fn parse_path_labels(value: &Yaml) -> Result<PathLabelMode, String> {
    match value.as_str() {
        Some("scope_relative") => Ok(PathLabelMode::ScopeRelative),
        Some("relative") => Ok(PathLabelMode::Relative),
        Some("basename") => Ok(PathLabelMode::Basename),
        other => Err(format!(
            "path_labels must be one of scope_relative/relative/basename, got {other:?}"
        )),
    }
}

/// Parses a filter node, recursively through `children`.
fn parse_filter_node(value: &Yaml) -> Result<FilterNode, String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| "filters must be a mapping".to_string())?;

    let mut node = FilterNode::default();
    for (key, val) in map {
        let Some(key) = key.as_str() else {
            return Err("filter keys must be strings".to_string());
        };
        match key {
            "mode" => {
                node.mode = Some(match val.as_str() {
                    Some("allow") => FilterMode::Allow,
                    Some("block") => FilterMode::Block,
                    other => return Err(format!("filter mode must be allow or block, got {other:?}")),
                });
            }
            "allow" => node.allow = string_list(val, "allow")?,
            "block" => node.block = string_list(val, "block")?,
            "when" => node.when = parse_conditional_filters(val)?,
            "children" => {
                let children = val
                    .as_mapping()
                    .ok_or_else(|| "children must be a mapping".to_string())?;
                for (child_key, child_val) in children {
                    let child_name = child_key
                        .as_str()
                        .ok_or_else(|| "children keys must be strings".to_string())?;
                    node.children
                        .insert(child_name.to_string(), parse_filter_node(child_val)?);
                }
            }
            other => return Err(format!("unknown filter key '{other}'")),
        }
    }
    Ok(node)
}

fn parse_conditional_filters(value: &Yaml) -> Result<Vec<ConditionalFilter>, String> {
    let items = value
        .as_sequence()
        .ok_or_else(|| "when must be a list".to_string())?;
    let mut out = Vec::new();
    for item in items {
        let map = item
            .as_mapping()
            .ok_or_else(|| "when entries must be mappings".to_string())?;
        let mut filter = ConditionalFilter {
            condition: String::new(),
            allow: Vec::new(),
            block: Vec::new(),
        };
        for (key, val) in map {
            match key.as_str() {
                Some("condition") => {
                    filter.condition = val
                        .as_str()
                        .ok_or_else(|| "condition must be a string".to_string())?
                        .to_string();
                }
                Some("allow") => filter.allow = string_list(val, "when.allow")?,
                Some("block") => filter.block = string_list(val, "when.block")?,
                other => return Err(format!("unknown when key {other:?}")),
            }
        }
        if filter.condition.is_empty() {
            return Err("when entries need a condition".to_string());
        }
        out.push(filter);
    }
    Ok(out)
}

/// Parses an adapter config: plain keys are base options, `when` holds the
/// ordered conditional patches.
fn parse_adapter_config(value: &Yaml) -> Result<AdapterConfig, String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| "adapter config must be a mapping".to_string())?;

    let mut config = AdapterConfig::default();
    for (key, val) in map {
        let Some(key) = key.as_str() else {
            return Err("adapter option keys must be strings".to_string());
        };
        if key == "when" {
            let items = val
                .as_sequence()
                .ok_or_else(|| "when must be a list".to_string())?;
            for item in items {
                let patch_map = item
                    .as_mapping()
                    .ok_or_else(|| "when entries must be mappings".to_string())?;
                let mut condition = String::new();
                let mut options = Options::new();
                for (patch_key, patch_val) in patch_map {
                    let Some(patch_key) = patch_key.as_str() else {
                        return Err("when option keys must be strings".to_string());
                    };
                    if patch_key == "condition" {
                        condition = patch_val
                            .as_str()
                            .ok_or_else(|| "condition must be a string".to_string())?
                            .to_string();
                    } else {
                        options.insert(patch_key.to_string(), yaml_to_json(patch_val));
                    }
                }
                if condition.is_empty() {
                    return Err("when entries need a condition".to_string());
                }
                config
                    .conditional_options
                    .push(ConditionalOptions { condition, options });
            }
        } else {
            config.base_options.insert(key.to_string(), yaml_to_json(val));
        }
    }
    Ok(config)
}

/// Parses the `targets` list.
fn parse_targets(value: &Yaml) -> Result<Vec<TargetRule>, String> {
    let items = value
        .as_sequence()
        .ok_or_else(|| "targets must be a list".to_string())?;
    let mut out = Vec::new();
    for item in items {
        let map = item
            .as_mapping()
            .ok_or_else(|| "target entries must be mappings".to_string())?;
        let mut rule = TargetRule {
            patterns: Vec::new(),
            adapter_patches: BTreeMap::new(),
        };
        for (key, val) in map {
            let Some(key) = key.as_str() else {
                return Err("target keys must be strings".to_string());
            };
            if key == "match" {
                rule.patterns = string_list(val, "match")?;
            } else {
                let patch = val
                    .as_mapping()
                    .ok_or_else(|| format!("target patch for '{key}' must be a mapping"))?;
                let mut options = Options::new();
                for (opt_key, opt_val) in patch {
                    let Some(opt_key) = opt_key.as_str() else {
                        return Err("target option keys must be strings".to_string());
                    };
                    options.insert(opt_key.to_string(), yaml_to_json(opt_val));
                }
                rule.adapter_patches.insert(key.to_string(), options);
            }
        }
        if rule.patterns.is_empty() {
            return Err("target entries need a match pattern".to_string());
        }
        out.push(rule);
    }
    Ok(out)
}

/// Specificity of a target rule: characters outside wildcards, summed over
/// its patterns. Used to order override application.
pub(crate) fn target_specificity(rule: &TargetRule) -> usize {
    rule.patterns
        .iter()
        .map(|p| p.chars().filter(|c| *c != '*' && *c != '?').count())
        .sum()
}

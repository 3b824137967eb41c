//! Adaptive data model: modes, mode-sets, tags, tag-sets.

use std::collections::{BTreeMap, BTreeSet};

use lg_vcs::VcsMode;

/// A specific mode within a mode-set.
///
/// Modes activate tags, may carry run commands per provider, and may set
/// run options (`vcs_mode`, `allow_tools`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mode {
    /// Mode id within its set.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Longer description, possibly empty.
    pub description: String,
    /// Tags activated when this mode is selected.
    pub tags: Vec<String>,
    /// Default task text offered to the provider.
    pub default_task: Option<String>,
    /// VCS mode forced while this mode is active.
    pub vcs_mode: Option<VcsMode>,
    /// Whether tools are allowed while this mode is active.
    pub allow_tools: Option<bool>,
    /// Provider id → command string. Non-empty makes the owning set an
    /// integration mode-set.
    pub runs: BTreeMap<String, String>,
}

impl Mode {
    /// Whether the mode declares a run command for the given full provider
    /// id.
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.runs.contains_key(provider_id)
    }
}

/// A named family of mutually exclusive modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSet {
    /// Mode-set id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Modes keyed by id.
    pub modes: BTreeMap<String, Mode>,
}

impl ModeSet {
    /// An integration mode-set has at least one mode with `runs`.
    pub fn is_integration(&self) -> bool {
        self.modes.values().any(|m| !m.runs.is_empty())
    }

    /// Union of provider ids supported by the set's modes.
    pub fn supported_providers(&self) -> BTreeSet<String> {
        self.modes
            .values()
            .flat_map(|m| m.runs.keys().cloned())
            .collect()
    }

    /// Filters to modes that support the full provider id.
    ///
    /// Content mode-sets pass through unchanged.
    pub fn filter_by_provider(&self, provider_id: &str) -> Self {
        if !self.is_integration() {
            return self.clone();
        }
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            modes: self
                .modes
                .iter()
                .filter(|(_, mode)| mode.has_provider(provider_id))
                .map(|(id, mode)| (id.clone(), mode.clone()))
                .collect(),
        }
    }
}

/// An atomic filtering tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    /// Tag id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Longer description, possibly empty.
    pub description: String,
}

/// A group of related tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    /// Tag-set id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Tags keyed by id.
    pub tags: BTreeMap<String, Tag>,
}

/// The merged adaptive model of a context or section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptiveModel {
    /// Mode-sets keyed by id.
    pub mode_sets: BTreeMap<String, ModeSet>,
    /// Tag-sets keyed by id.
    pub tag_sets: BTreeMap<String, TagSet>,
}

impl AdaptiveModel {
    /// All integration mode-sets, in id order.
    pub fn integration_mode_sets(&self) -> Vec<&ModeSet> {
        self.mode_sets
            .values()
            .filter(|set| set.is_integration())
            .collect()
    }

    /// The single integration mode-set, when exactly one exists.
    pub fn integration_mode_set(&self) -> Option<&ModeSet> {
        let sets = self.integration_mode_sets();
        match sets.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// Whether a `set:mode` pair exists in the model.
    pub fn has_mode(&self, set_id: &str, mode_id: &str) -> bool {
        self.mode_sets
            .get(set_id)
            .is_some_and(|set| set.modes.contains_key(mode_id))
    }

    /// Tag-set membership map, as the condition evaluator consumes it.
    pub fn tagset_members(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.tag_sets
            .iter()
            .map(|(id, set)| (id.clone(), set.tags.keys().cloned().collect()))
            .collect()
    }

    /// Filters the integration mode-set by provider; content sets and
    /// tag-sets pass through unchanged.
    pub fn filter_by_provider(&self, provider_id: &str) -> Self {
        Self {
            mode_sets: self
                .mode_sets
                .iter()
                .map(|(id, set)| (id.clone(), set.filter_by_provider(provider_id)))
                .collect(),
            tag_sets: self.tag_sets.clone(),
        }
    }

    /// Merges another model onto this one; `other` wins on conflicts.
    ///
    /// Within a set present on both sides, the other side's modes/tags
    /// override by id and its title wins; sets only on one side carry over.
    pub fn merge_with(&self, other: &Self) -> Self {
        let mut mode_sets = self.mode_sets.clone();
        for (id, other_set) in &other.mode_sets {
            match mode_sets.get_mut(id) {
                Some(existing) => {
                    existing.title = other_set.title.clone();
                    for (mode_id, mode) in &other_set.modes {
                        existing.modes.insert(mode_id.clone(), mode.clone());
                    }
                }
                None => {
                    mode_sets.insert(id.clone(), other_set.clone());
                }
            }
        }

        let mut tag_sets = self.tag_sets.clone();
        for (id, other_set) in &other.tag_sets {
            match tag_sets.get_mut(id) {
                Some(existing) => {
                    existing.title = other_set.title.clone();
                    for (tag_id, tag) in &other_set.tags {
                        existing.tags.insert(tag_id.clone(), tag.clone());
                    }
                }
                None => {
                    tag_sets.insert(id.clone(), other_set.clone());
                }
            }
        }

        Self {
            mode_sets,
            tag_sets,
        }
    }

    /// Whether the model carries no adaptive data at all.
    pub fn is_empty(&self) -> bool {
        self.mode_sets.is_empty() && self.tag_sets.is_empty()
    }
}

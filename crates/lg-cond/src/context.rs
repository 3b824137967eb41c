//! Evaluation context for conditions.

use std::collections::{BTreeMap, BTreeSet};

/// The state a condition is evaluated against.
///
/// Built by the caller from the run's active tags, the merged adaptive
/// model's tag-sets, the current origin, and the normalised provider id.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    /// Tags currently active (from CLI flags, modes, and `{% mode %}` blocks).
    pub active_tags: BTreeSet<String>,
    /// Tag-set membership: set id → member tag ids.
    pub tagsets: BTreeMap<String, BTreeSet<String>>,
    /// Current origin label: `"self"` or `""` means local; anything else is
    /// a cross-scope expansion.
    pub current_scope: String,
    /// Normalised provider base id, when a provider was selected.
    pub provider_base: Option<String>,
}

impl ConditionContext {
    /// Context with only active tags set; convenient in tests and adapters.
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            active_tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// True when the current origin refers to the local scope.
    pub fn is_local_scope(&self) -> bool {
        self.current_scope.is_empty() || self.current_scope == "self"
    }
}

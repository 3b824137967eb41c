//! Run state for template expansion.
//!
//! `{% mode %}` blocks and cross-scope includes push state; leaving the
//! block or include restores exactly the state at entry.

use std::collections::{BTreeMap, BTreeSet};

use lg_adaptive::AdaptiveModel;
use lg_cond::ConditionContext;
use lg_vcs::VcsMode;

/// The active adaptive state at one point of an expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveState {
    /// Current scope label: `"self"` for the run's base scope, otherwise
    /// the scope's repo-relative path.
    pub origin: String,
    /// Selected mode per mode-set.
    pub active_modes: BTreeMap<String, String>,
    /// Active tags.
    pub active_tags: BTreeSet<String>,
    /// Effective VCS mode.
    pub vcs_mode: VcsMode,
    /// Whether tools are allowed.
    pub allow_tools: bool,
}

impl ActiveState {
    /// The initial state of a run.
    pub fn new(
        active_modes: BTreeMap<String, String>,
        active_tags: BTreeSet<String>,
        vcs_mode: VcsMode,
    ) -> Self {
        Self {
            origin: "self".to_string(),
            active_modes,
            active_tags,
            vcs_mode,
            allow_tools: false,
        }
    }

    /// Builds the condition context for this state.
    pub fn condition_context(
        &self,
        model: &AdaptiveModel,
        provider_base: Option<&str>,
    ) -> ConditionContext {
        ConditionContext {
            active_tags: self.active_tags.clone(),
            tagsets: model.tagset_members(),
            current_scope: self.origin.clone(),
            provider_base: provider_base.map(String::from),
        }
    }
}

impl Default for ActiveState {
    fn default() -> Self {
        Self::new(BTreeMap::new(), BTreeSet::new(), VcsMode::All)
    }
}

/// A stack of active states.
#[derive(Debug, Default)]
pub struct StateStack {
    /// Frames; never empty after construction.
    frames: Vec<ActiveState>,
}

impl StateStack {
    /// Creates a stack with a base state.
    pub fn new(base: ActiveState) -> Self {
        Self { frames: vec![base] }
    }

    /// The innermost state.
    pub fn current(&self) -> &ActiveState {
        self.frames.last().expect("state stack is never empty")
    }

    /// Pushes a state derived from the current one by activating a mode.
    ///
    /// The caller validated the `set:mode` pair against the adaptive model.
    pub fn push_mode(&mut self, model: &AdaptiveModel, set: &str, mode_id: &str) {
        let mut next = self.current().clone();
        next.active_modes.insert(set.to_string(), mode_id.to_string());
        if let Some(mode) = model.mode_sets.get(set).and_then(|s| s.modes.get(mode_id)) {
            for tag in &mode.tags {
                next.active_tags.insert(tag.clone());
            }
            if let Some(vcs_mode) = mode.vcs_mode {
                next.vcs_mode = vcs_mode;
            }
            if let Some(allow_tools) = mode.allow_tools {
                next.allow_tools = allow_tools;
            }
        }
        self.frames.push(next);
    }

    /// Pushes a state with a different origin (cross-scope include).
    pub fn push_origin(&mut self, origin: &str) {
        let mut next = self.current().clone();
        next.origin = origin.to_string();
        self.frames.push(next);
    }

    /// Pops the innermost state. The base state is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use lg_adaptive::{Mode, ModeSet};

    use super::*;

    fn model_with_agent_mode() -> AdaptiveModel {
        let mode = Mode {
            id: "agent".into(),
            title: "Agent".into(),
            tags: vec!["agent".into(), "tools".into()],
            allow_tools: Some(true),
            vcs_mode: Some(VcsMode::Changes),
            ..Mode::default()
        };
        let set = ModeSet {
            id: "ai".into(),
            title: "AI".into(),
            modes: [("agent".to_string(), mode)].into(),
        };
        let mut model = AdaptiveModel::default();
        model.mode_sets.insert("ai".into(), set);
        model
    }

    #[test]
    fn mode_push_activates_tags_and_options() {
        let model = model_with_agent_mode();
        let mut stack = StateStack::new(ActiveState::default());

        stack.push_mode(&model, "ai", "agent");
        let state = stack.current();
        assert!(state.active_tags.contains("agent"));
        assert!(state.active_tags.contains("tools"));
        assert_eq!(state.active_modes["ai"], "agent");
        assert!(state.allow_tools);
        assert_eq!(state.vcs_mode, VcsMode::Changes);
    }

    #[test]
    fn pop_restores_exactly() {
        let model = model_with_agent_mode();
        let base = ActiveState::default();
        let mut stack = StateStack::new(base.clone());

        stack.push_mode(&model, "ai", "agent");
        stack.pop();
        assert_eq!(stack.current(), &base);
        // The base frame survives extra pops.
        stack.pop();
        assert_eq!(stack.current(), &base);
    }

    #[test]
    fn origin_push_changes_scope_only() {
        let mut stack = StateStack::new(ActiveState::default());
        stack.push_origin("apps/web");
        assert_eq!(stack.current().origin, "apps/web");
        assert!(stack.current().active_tags.is_empty());
        stack.pop();
        assert_eq!(stack.current().origin, "self");
    }

    #[test]
    fn condition_context_projection() {
        let model = model_with_agent_mode();
        let mut stack = StateStack::new(ActiveState::default());
        stack.push_mode(&model, "ai", "agent");

        let ctx = stack
            .current()
            .condition_context(&model, Some("com.test"));
        assert!(ctx.active_tags.contains("agent"));
        assert_eq!(ctx.provider_base.as_deref(), Some("com.test"));
        assert!(ctx.is_local_scope());
    }
}

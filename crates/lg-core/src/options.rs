//! Run options.

use std::collections::{BTreeMap, BTreeSet};

use lg_stats::ModelInfo;
use lg_vcs::VcsMode;

/// Options for one engine run, assembled by the CLI.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Model metadata for token accounting.
    pub model: ModelInfo,
    /// Modes selected up front: mode-set id → mode id.
    pub modes: BTreeMap<String, String>,
    /// Extra tags activated up front.
    pub extra_tags: BTreeSet<String>,
    /// Full provider id, when an integration provider drives the run.
    pub provider: Option<String>,
    /// Explicit VCS mode; `None` lets active modes decide (default `all`).
    pub vcs_mode: Option<VcsMode>,
    /// Target branch for `branch-changes`.
    pub target_branch: Option<String>,
    /// Global code-fence switch (sections can still opt out).
    pub code_fence: bool,
    /// Fresh mode: bypass cache reads.
    pub fresh: bool,
}

impl RunOptions {
    /// Defaults with fencing on.
    pub fn new() -> Self {
        Self {
            code_fence: true,
            ..Self::default()
        }
    }
}

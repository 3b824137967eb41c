//! The section planner.
//!
//! Groups a manifest's files for rendering: fenced sections split into
//! maximal consecutive runs of one language, unfenced sections become a
//! single group.

use std::collections::BTreeMap;

use lg_filter::{FileEntry, SectionManifest};

use crate::labels::build_labels;

/// One render group: files sharing a fence.
#[derive(Debug, Clone)]
pub struct PlanGroup {
    /// Fence language ("" for markdown/plain).
    pub lang: String,
    /// Files in manifest order.
    pub entries: Vec<FileEntry>,
    /// Whether the group mixes languages (unfenced sections only).
    pub mixed: bool,
}

/// The render plan of one section.
#[derive(Debug, Clone)]
pub struct SectionPlan {
    /// Render groups in order.
    pub groups: Vec<PlanGroup>,
    /// Whether every file is markdown/plain text.
    pub md_only: bool,
    /// Whether fenced blocks are used.
    pub use_fence: bool,
    /// `rel_path → label` for file markers.
    pub labels: BTreeMap<String, String>,
}

/// Builds the plan for a manifest.
///
/// `code_fence` is the conjunction of the global option and the section's
/// own policy; markdown-only sections never fence.
pub fn build_plan(manifest: &SectionManifest, code_fence: bool, origin: &str) -> SectionPlan {
    let files = &manifest.files;
    let md_only = !files.is_empty() && files.iter().all(|f| f.language_hint.is_empty());
    let use_fence = code_fence && !md_only;

    let groups = if files.is_empty() {
        Vec::new()
    } else if use_fence {
        let mut groups: Vec<PlanGroup> = Vec::new();
        for file in files {
            match groups.last_mut() {
                Some(group) if group.lang == file.language_hint => {
                    group.entries.push(file.clone());
                }
                _ => groups.push(PlanGroup {
                    lang: file.language_hint.clone(),
                    entries: vec![file.clone()],
                    mixed: false,
                }),
            }
        }
        groups
    } else {
        let distinct: std::collections::BTreeSet<&str> =
            files.iter().map(|f| f.language_hint.as_str()).collect();
        vec![PlanGroup {
            lang: String::new(),
            entries: files.clone(),
            mixed: distinct.len() > 1,
        }]
    };

    let rel_paths: Vec<String> = files.iter().map(|f| f.rel_path.clone()).collect();
    let labels = build_labels(&rel_paths, manifest.path_labels, origin);

    SectionPlan {
        groups,
        md_only,
        use_fence,
        labels,
    }
}

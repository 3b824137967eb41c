//! The section renderer.
//!
//! Turns a plan plus processed files into the section's markdown text:
//!
//! - fenced: one triple-backtick block per group, a file marker before
//!   every file, one blank line between files and between blocks;
//! - markdown-only unfenced: plain concatenation, no markers;
//! - mixed unfenced: markers, no fences.
//!
//! The output is trimmed and ends with exactly one newline when non-empty.

use std::collections::HashMap;

use lg_adapter::ProcessedFile;

use crate::planner::SectionPlan;

/// Renders the file separator line.
pub fn render_file_marker(label: &str) -> String {
    format!("# \u{2014}\u{2014} FILE: {label} \u{2014}\u{2014}\n")
}

/// Renders one section.
///
/// `processed` may omit manifest files (adapter skips); omitted files are
/// silently absent from the output.
pub fn render_section_text(plan: &SectionPlan, processed: &[ProcessedFile]) -> String {
    let by_rel: HashMap<&str, &ProcessedFile> = processed
        .iter()
        .map(|f| (f.rel_path.as_str(), f))
        .collect();

    let mut out = String::new();

    if plan.use_fence {
        for group in &plan.groups {
            let mut block = String::new();
            let mut first = true;
            for entry in &group.entries {
                let Some(file) = by_rel.get(entry.rel_path.as_str()) else {
                    continue;
                };
                if !first {
                    block.push_str("\n\n");
                }
                first = false;
                let label = plan
                    .labels
                    .get(&entry.rel_path)
                    .map(String::as_str)
                    .unwrap_or(&entry.rel_path);
                block.push_str(&render_file_marker(label));
                block.push_str(file.processed_text.trim_end_matches('\n'));
            }
            if first {
                // Every file in the group was skipped.
                continue;
            }
            out.push_str("```");
            out.push_str(&group.lang);
            out.push('\n');
            out.push_str(&block);
            out.push_str("\n```\n\n");
        }
    } else {
        let mut first = true;
        for group in &plan.groups {
            for entry in &group.entries {
                let Some(file) = by_rel.get(entry.rel_path.as_str()) else {
                    continue;
                };
                if !first {
                    out.push_str("\n\n");
                }
                first = false;
                if !plan.md_only {
                    let label = plan
                        .labels
                        .get(&entry.rel_path)
                        .map(String::as_str)
                        .unwrap_or(&entry.rel_path);
                    out.push_str(&render_file_marker(label));
                }
                out.push_str(file.processed_text.trim_end_matches('\n'));
            }
        }
    }

    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

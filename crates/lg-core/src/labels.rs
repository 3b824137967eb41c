//! Display labels for file markers.

use std::collections::BTreeMap;

use lg_config::PathLabelMode;
use lg_path::strip_prefix_posix;

/// Builds the `rel_path → label` map for a section's files.
///
/// - `Relative`: the full repo-relative path.
/// - `ScopeRelative`: strip the current origin prefix when present;
///   otherwise behave like `Relative`.
/// - `Basename`: the shortest unique suffix across the files (start at the
///   basename, extend left until disambiguated).
pub fn build_labels(
    rel_paths: &[String],
    mode: PathLabelMode,
    origin: &str,
) -> BTreeMap<String, String> {
    match mode {
        PathLabelMode::Relative => identity_labels(rel_paths),
        PathLabelMode::ScopeRelative => {
            if origin.is_empty() || origin == "self" {
                return identity_labels(rel_paths);
            }
            rel_paths
                .iter()
                .map(|path| {
                    let label = strip_prefix_posix(path, origin)
                        .filter(|rest| !rest.is_empty())
                        .unwrap_or(path);
                    (path.clone(), label.to_string())
                })
                .collect()
        }
        PathLabelMode::Basename => {
            let split: Vec<Vec<&str>> =
                rel_paths.iter().map(|p| p.split('/').collect()).collect();
            let suffixes = minimal_unique_suffixes(&split);
            rel_paths
                .iter()
                .zip(suffixes)
                .map(|(path, label)| (path.clone(), label))
                .collect()
        }
    }
}

fn identity_labels(rel_paths: &[String]) -> BTreeMap<String, String> {
    rel_paths.iter().map(|p| (p.clone(), p.clone())).collect()
}

/// For each path, the minimal component suffix unique across all paths.
fn minimal_unique_suffixes(paths: &[Vec<&str>]) -> Vec<String> {
    let count = paths.len();
    let mut suffix_len = vec![1usize; count];

    loop {
        let keys: Vec<Vec<&str>> = paths
            .iter()
            .zip(&suffix_len)
            .map(|(parts, len)| parts[parts.len().saturating_sub(*len)..].to_vec())
            .collect();

        let mut grew = false;
        for i in 0..count {
            let clashes = keys
                .iter()
                .enumerate()
                .any(|(j, key)| j != i && *key == keys[i]);
            if clashes && suffix_len[i] < paths[i].len() {
                suffix_len[i] += 1;
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    paths
        .iter()
        .zip(&suffix_len)
        .map(|(parts, len)| parts[parts.len().saturating_sub(*len)..].join("/"))
        .collect()
}

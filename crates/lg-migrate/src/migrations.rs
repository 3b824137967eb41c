//! Built-in migrations.

use serde_yaml::{Mapping, Value};

use crate::error::MigrationError;
use crate::fs::CfgFs;
use crate::registry::Migration;

/// Parses a YAML document into a mapping, tolerating an empty file.
fn load_mapping(cfg_fs: &CfgFs, rel: &str, id: u32, title: &'static str) -> Result<Mapping, MigrationError> {
    let text = cfg_fs
        .read_text(rel)
        .map_err(|e| MigrationError::fatal(id, title, format!("cannot read {rel}: {e}")))?;
    let value: Value = serde_yaml::from_str(&text)
        .map_err(|e| MigrationError::fatal(id, title, format!("cannot parse {rel}: {e}")))?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(MigrationError::fatal(
            id,
            title,
            format!("{rel} must be a mapping"),
        )),
    }
}

fn dump_mapping(map: &Mapping) -> String {
    serde_yaml::to_string(&Value::Mapping(map.clone())).unwrap_or_default()
}

/// #1: merge legacy `modes.yaml`/`tags.yaml` into an `adaptive.sec.yaml`
/// meta-section.
pub(crate) struct LegacyAdaptiveFiles;

impl Migration for LegacyAdaptiveFiles {
    fn id(&self) -> u32 {
        1
    }

    fn title(&self) -> &'static str {
        "merge legacy modes.yaml/tags.yaml into a meta-section"
    }

    fn run(&self, cfg_fs: &CfgFs, allow_side_effects: bool) -> Result<bool, MigrationError> {
        let has_modes = cfg_fs.exists("modes.yaml");
        let has_tags = cfg_fs.exists("tags.yaml");
        if !has_modes && !has_tags {
            return Ok(false);
        }
        if !allow_side_effects {
            return Err(MigrationError::PreflightRequired {
                id: self.id(),
                title: self.title().to_string(),
            });
        }

        let mut section = Mapping::new();
        if has_modes {
            let modes = load_mapping(cfg_fs, "modes.yaml", self.id(), self.title())?;
            if let Some(sets) = modes.get(Value::from("mode-sets")) {
                section.insert(Value::from("mode-sets"), sets.clone());
            }
        }
        if has_tags {
            let tags = load_mapping(cfg_fs, "tags.yaml", self.id(), self.title())?;
            if let Some(sets) = tags.get(Value::from("tag-sets")) {
                section.insert(Value::from("tag-sets"), sets.clone());
            }
        }

        let mut doc = Mapping::new();
        doc.insert(Value::from("adaptive"), Value::Mapping(section));
        cfg_fs
            .write_text_atomic("adaptive.sec.yaml", &dump_mapping(&doc))
            .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;

        if has_modes {
            cfg_fs
                .remove("modes.yaml")
                .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;
        }
        if has_tags {
            cfg_fs
                .remove("tags.yaml")
                .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;
        }
        Ok(true)
    }
}

/// #2: rewrite adapter-level boolean `skip_empty` options into the
/// `empty_policy` enum form.
pub(crate) struct SkipEmptyToPolicy;

impl SkipEmptyToPolicy {
    /// Rewrites one section mapping in place; returns whether it changed.
    fn rewrite_section(section: &mut Mapping) -> bool {
        // Structural keys are not adapter configs.
        const STRUCTURAL: &[&str] = &[
            "extends",
            "extensions",
            "filters",
            "targets",
            "mode-sets",
            "tag-sets",
            "path_labels",
            "skip_empty",
            "code_fence",
        ];
        let mut changed = false;
        for (key, value) in section.iter_mut() {
            let Some(name) = key.as_str() else { continue };
            if STRUCTURAL.contains(&name) {
                continue;
            }
            let Some(adapter) = value.as_mapping_mut() else {
                continue;
            };
            if let Some(Value::Bool(skip)) = adapter.remove(Value::from("skip_empty")) {
                let policy = if skip { "exclude" } else { "include" };
                adapter.insert(Value::from("empty_policy"), Value::from(policy));
                changed = true;
            }
        }
        changed
    }
}

impl Migration for SkipEmptyToPolicy {
    fn id(&self) -> u32 {
        2
    }

    fn title(&self) -> &'static str {
        "normalise adapter skip_empty into empty_policy"
    }

    fn run(&self, cfg_fs: &CfgFs, _allow_side_effects: bool) -> Result<bool, MigrationError> {
        let mut files: Vec<String> = cfg_fs
            .list_files("")
            .into_iter()
            .filter(|f| f == "sections.yaml" || f.ends_with(".sec.yaml"))
            .collect();
        files.sort();

        let mut changed = false;
        for file in files {
            let mut doc = load_mapping(cfg_fs, &file, self.id(), self.title())?;
            let mut file_changed = false;
            for (_, section) in doc.iter_mut() {
                if let Some(map) = section.as_mapping_mut() {
                    file_changed |= Self::rewrite_section(map);
                }
            }
            if file_changed {
                cfg_fs
                    .write_text_atomic(&file, &dump_mapping(&doc))
                    .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// #3: flatten `contexts/<name>.md` files into `<name>.ctx.md`.
pub(crate) struct FlattenContexts;

impl Migration for FlattenContexts {
    fn id(&self) -> u32 {
        3
    }

    fn title(&self) -> &'static str {
        "flatten contexts/ into *.ctx.md"
    }

    fn run(&self, cfg_fs: &CfgFs, allow_side_effects: bool) -> Result<bool, MigrationError> {
        let files: Vec<String> = cfg_fs
            .list_files("contexts")
            .into_iter()
            .filter(|f| f.ends_with(".md"))
            .collect();
        if files.is_empty() {
            return Ok(false);
        }
        if !allow_side_effects {
            return Err(MigrationError::PreflightRequired {
                id: self.id(),
                title: self.title().to_string(),
            });
        }

        for file in files {
            let stem = file.trim_end_matches(".md");
            let src = format!("contexts/{file}");
            let dst = format!("{stem}.ctx.md");
            cfg_fs
                .move_atomic(&src, &dst)
                .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;
        }
        Ok(true)
    }
}

/// #4: drop the obsolete `schema_version` key from `sections.yaml`.
pub(crate) struct DropSchemaVersion;

impl Migration for DropSchemaVersion {
    fn id(&self) -> u32 {
        4
    }

    fn title(&self) -> &'static str {
        "drop schema_version from sections.yaml"
    }

    fn run(&self, cfg_fs: &CfgFs, _allow_side_effects: bool) -> Result<bool, MigrationError> {
        if !cfg_fs.exists("sections.yaml") {
            return Ok(false);
        }
        let mut doc = load_mapping(cfg_fs, "sections.yaml", self.id(), self.title())?;
        if doc.remove(Value::from("schema_version")).is_none() {
            return Ok(false);
        }
        cfg_fs
            .write_text_atomic("sections.yaml", &dump_mapping(&doc))
            .map_err(|e| MigrationError::fatal(self.id(), self.title(), e.to_string()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn make_fs() -> (tempfile::TempDir, CfgFs) {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("lg-cfg");
        fs::create_dir_all(&cfg).unwrap();
        let handle = CfgFs::new(tmp.path(), &cfg);
        (tmp, handle)
    }

    #[test]
    fn legacy_adaptive_merges_and_removes() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs
            .write_text_atomic(
                "modes.yaml",
                "mode-sets:\n  ai:\n    title: AI\n    modes:\n      ask:\n        title: Ask\n",
            )
            .unwrap();
        cfg_fs
            .write_text_atomic("tags.yaml", "tag-sets:\n  language:\n    title: Language\n")
            .unwrap();

        let changed = LegacyAdaptiveFiles.run(&cfg_fs, true).unwrap();
        assert!(changed);
        assert!(!cfg_fs.exists("modes.yaml"));
        assert!(!cfg_fs.exists("tags.yaml"));

        let merged = cfg_fs.read_text("adaptive.sec.yaml").unwrap();
        assert!(merged.contains("mode-sets"));
        assert!(merged.contains("tag-sets"));

        // Second run is a no-op.
        assert!(!LegacyAdaptiveFiles.run(&cfg_fs, true).unwrap());
    }

    #[test]
    fn legacy_adaptive_requires_preflight() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs.write_text_atomic("modes.yaml", "mode-sets: {}\n").unwrap();
        let err = LegacyAdaptiveFiles.run(&cfg_fs, false).unwrap_err();
        assert!(matches!(err, MigrationError::PreflightRequired { id: 1, .. }));
    }

    #[test]
    fn skip_empty_becomes_policy() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs
            .write_text_atomic(
                "sections.yaml",
                "src:\n  extensions: [\".py\"]\n  skip_empty: true\n  python:\n    skip_empty: true\n",
            )
            .unwrap();

        assert!(SkipEmptyToPolicy.run(&cfg_fs, true).unwrap());
        let text = cfg_fs.read_text("sections.yaml").unwrap();
        // The section-level boolean stays; only the adapter option changes.
        assert!(text.contains("empty_policy: exclude"));
        let doc: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(doc["src"]["skip_empty"], Value::Bool(true));
        assert!(doc["src"]["python"].get("skip_empty").is_none());

        assert!(!SkipEmptyToPolicy.run(&cfg_fs, true).unwrap());
    }

    #[test]
    fn contexts_flattened() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs.write_text_atomic("contexts/dev.md", "# Dev\n").unwrap();
        assert!(FlattenContexts.run(&cfg_fs, true).unwrap());
        assert!(cfg_fs.exists("dev.ctx.md"));
        assert!(!cfg_fs.exists("contexts/dev.md"));
        assert!(!FlattenContexts.run(&cfg_fs, true).unwrap());
    }

    #[test]
    fn contexts_flatten_requires_preflight() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs.write_text_atomic("contexts/dev.md", "# Dev\n").unwrap();
        let err = FlattenContexts.run(&cfg_fs, false).unwrap_err();
        assert!(matches!(err, MigrationError::PreflightRequired { id: 3, .. }));
    }

    #[test]
    fn schema_version_dropped() {
        let (_tmp, cfg_fs) = make_fs();
        cfg_fs
            .write_text_atomic("sections.yaml", "schema_version: 2\nsrc:\n  extensions: [\".py\"]\n")
            .unwrap();
        assert!(DropSchemaVersion.run(&cfg_fs, true).unwrap());
        let text = cfg_fs.read_text("sections.yaml").unwrap();
        assert!(!text.contains("schema_version"));
        assert!(!DropSchemaVersion.run(&cfg_fs, true).unwrap());
    }
}

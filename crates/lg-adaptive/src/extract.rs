//! Extraction of adaptive data from raw section YAML.

use std::collections::BTreeMap;

use serde_yaml::Value as Yaml;

use lg_config::SectionConfig;
use lg_vcs::VcsMode;

use crate::error::AdaptiveError;
use crate::model::{AdaptiveModel, Mode, ModeSet, Tag, TagSet};

/// Builds the adaptive model declared directly by one section (its
/// `mode-sets` and `tag-sets` keys), before any extends merging.
pub fn extract_adaptive_model(config: &SectionConfig) -> Result<AdaptiveModel, AdaptiveError> {
    let shape_err = |message: String| AdaptiveError::InvalidShape {
        section: config.name.clone(),
        message,
    };

    let mut model = AdaptiveModel::default();

    for (set_id, raw) in &config.mode_sets_raw {
        model
            .mode_sets
            .insert(set_id.clone(), parse_mode_set(set_id, raw).map_err(&shape_err)?);
    }
    for (set_id, raw) in &config.tag_sets_raw {
        model
            .tag_sets
            .insert(set_id.clone(), parse_tag_set(set_id, raw).map_err(&shape_err)?);
    }

    Ok(model)
}

fn parse_mode_set(set_id: &str, raw: &Yaml) -> Result<ModeSet, String> {
    let map = raw
        .as_mapping()
        .ok_or_else(|| format!("mode-set '{set_id}' must be a mapping"))?;

    let mut set = ModeSet {
        id: set_id.to_string(),
        title: set_id.to_string(),
        modes: BTreeMap::new(),
    };

    for (key, value) in map {
        match key.as_str() {
            Some("title") => {
                set.title = value
                    .as_str()
                    .ok_or_else(|| format!("mode-set '{set_id}' title must be a string"))?
                    .to_string();
            }
            Some("modes") => {
                let modes = value
                    .as_mapping()
                    .ok_or_else(|| format!("mode-set '{set_id}' modes must be a mapping"))?;
                for (mode_key, mode_value) in modes {
                    let mode_id = mode_key
                        .as_str()
                        .ok_or_else(|| format!("mode ids in '{set_id}' must be strings"))?;
                    set.modes
                        .insert(mode_id.to_string(), parse_mode(set_id, mode_id, mode_value)?);
                }
            }
            Some(other) => return Err(format!("unknown mode-set key '{other}' in '{set_id}'")),
            None => return Err(format!("mode-set '{set_id}' keys must be strings")),
        }
    }

    Ok(set)
}

fn parse_mode(set_id: &str, mode_id: &str, raw: &Yaml) -> Result<Mode, String> {
    // Short form: `ask: "Ask"` is just a title.
    if let Some(title) = raw.as_str() {
        return Ok(Mode {
            id: mode_id.to_string(),
            title: title.to_string(),
            ..Mode::default()
        });
    }

    let map = raw
        .as_mapping()
        .ok_or_else(|| format!("mode '{set_id}:{mode_id}' must be a mapping or string"))?;

    let mut mode = Mode {
        id: mode_id.to_string(),
        title: mode_id.to_string(),
        ..Mode::default()
    };

    for (key, value) in map {
        match key.as_str() {
            Some("title") => {
                mode.title = value
                    .as_str()
                    .ok_or_else(|| format!("mode '{set_id}:{mode_id}' title must be a string"))?
                    .to_string();
            }
            Some("description") => {
                mode.description = value.as_str().unwrap_or_default().to_string();
            }
            Some("tags") => {
                let tags = value
                    .as_sequence()
                    .ok_or_else(|| format!("mode '{set_id}:{mode_id}' tags must be a list"))?;
                mode.tags = tags
                    .iter()
                    .map(|t| {
                        t.as_str()
                            .map(String::from)
                            .ok_or_else(|| format!("tags of '{set_id}:{mode_id}' must be strings"))
                    })
                    .collect::<Result<_, _>>()?;
            }
            Some("default_task") => {
                mode.default_task = value.as_str().map(String::from);
            }
            Some("vcs_mode") => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("vcs_mode of '{set_id}:{mode_id}' must be a string"))?;
                mode.vcs_mode = Some(VcsMode::parse(text).ok_or_else(|| {
                    format!("vcs_mode of '{set_id}:{mode_id}' must be all/changes/branch-changes")
                })?);
            }
            Some("allow_tools") => {
                mode.allow_tools = Some(value.as_bool().ok_or_else(|| {
                    format!("allow_tools of '{set_id}:{mode_id}' must be a boolean")
                })?);
            }
            Some("runs") => {
                let runs = value
                    .as_mapping()
                    .ok_or_else(|| format!("runs of '{set_id}:{mode_id}' must be a mapping"))?;
                for (provider, command) in runs {
                    let provider = provider.as_str().ok_or_else(|| {
                        format!("provider ids of '{set_id}:{mode_id}' must be strings")
                    })?;
                    let command = command.as_str().ok_or_else(|| {
                        format!("run command of '{set_id}:{mode_id}' must be a string")
                    })?;
                    mode.runs.insert(provider.to_string(), command.to_string());
                }
            }
            Some(other) => {
                return Err(format!("unknown mode key '{other}' in '{set_id}:{mode_id}'"));
            }
            None => return Err(format!("mode '{set_id}:{mode_id}' keys must be strings")),
        }
    }

    Ok(mode)
}

fn parse_tag_set(set_id: &str, raw: &Yaml) -> Result<TagSet, String> {
    let map = raw
        .as_mapping()
        .ok_or_else(|| format!("tag-set '{set_id}' must be a mapping"))?;

    let mut set = TagSet {
        id: set_id.to_string(),
        title: set_id.to_string(),
        tags: BTreeMap::new(),
    };

    for (key, value) in map {
        match key.as_str() {
            Some("title") => {
                set.title = value
                    .as_str()
                    .ok_or_else(|| format!("tag-set '{set_id}' title must be a string"))?
                    .to_string();
            }
            Some("tags") => {
                let tags = value
                    .as_mapping()
                    .ok_or_else(|| format!("tag-set '{set_id}' tags must be a mapping"))?;
                for (tag_key, tag_value) in tags {
                    let tag_id = tag_key
                        .as_str()
                        .ok_or_else(|| format!("tag ids in '{set_id}' must be strings"))?;
                    set.tags
                        .insert(tag_id.to_string(), parse_tag(set_id, tag_id, tag_value)?);
                }
            }
            Some(other) => return Err(format!("unknown tag-set key '{other}' in '{set_id}'")),
            None => return Err(format!("tag-set '{set_id}' keys must be strings")),
        }
    }

    Ok(set)
}

fn parse_tag(set_id: &str, tag_id: &str, raw: &Yaml) -> Result<Tag, String> {
    // Short form: `python: "Python"`.
    if let Some(title) = raw.as_str() {
        return Ok(Tag {
            id: tag_id.to_string(),
            title: title.to_string(),
            description: String::new(),
        });
    }
    let map = raw
        .as_mapping()
        .ok_or_else(|| format!("tag '{set_id}:{tag_id}' must be a mapping or string"))?;

    let mut tag = Tag {
        id: tag_id.to_string(),
        title: tag_id.to_string(),
        description: String::new(),
    };
    for (key, value) in map {
        match key.as_str() {
            Some("title") => tag.title = value.as_str().unwrap_or(tag_id).to_string(),
            Some("description") => tag.description = value.as_str().unwrap_or_default().to_string(),
            Some(other) => return Err(format!("unknown tag key '{other}' in '{set_id}:{tag_id}'")),
            None => return Err(format!("tag '{set_id}:{tag_id}' keys must be strings")),
        }
    }
    Ok(tag)
}

//! YAML → JSON value conversion.
//!
//! Adapter options are opaque to the engine: they are parsed from YAML and
//! carried as JSON values, whose canonical rendering feeds cache keys.

use serde_json::{Map, Number, Value as Json};
use serde_yaml::Value as Yaml;

/// Converts a YAML value to a JSON value.
///
/// Non-string mapping keys are rendered through their YAML string form;
/// tagged values collapse to their inner value.
pub fn yaml_to_json(value: &Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(*b),
        Yaml::Number(num) => {
            if let Some(i) = num.as_i64() {
                Json::Number(i.into())
            } else if let Some(u) = num.as_u64() {
                Json::Number(u.into())
            } else {
                num.as_f64()
                    .and_then(Number::from_f64)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
        }
        Yaml::String(s) => Json::String(s.clone()),
        Yaml::Sequence(items) => Json::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                let key = match key {
                    Yaml::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                out.insert(key, yaml_to_json(val));
            }
            Json::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

//! Canonical JSON for cache keys.

use serde_json::Value;

/// Renders a JSON value into a canonical string: object keys sorted,
/// no insignificant whitespace.
///
/// Cache keys hash this rendering, so two configurations that differ only
/// in map ordering produce the same key.
pub fn freeze_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            // serde_json's default map preserves insertion order off and is
            // a BTreeMap, but callers may enable preserve_order elsewhere;
            // sort explicitly so the contract holds regardless.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

//! Encoding of web service arguments as form fields.
//!
//! Moodle's REST server expects nested arguments as flat form fields whose
//! names describe the structure: `{"courses": [{"id": 1}]}` is sent as
//! `courses[0][id]=1`.

use serde_json::Value;

/// Flatten a JSON argument tree into `(name, value)` form pairs.
///
/// `null` values are skipped and booleans are sent as `1`/`0`.
pub fn flatten_params(args: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(args, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((prefix.to_string(), if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten_into(item, &child_key(prefix, &idx.to_string()), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten_into(item, &child_key(prefix, key), out);
            }
        }
    }
}

fn child_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}[{key}]")
    }
}

//! JSON flattening: one line per scalar leaf with a dotted/indexed path.

use super::LoaderError;
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub(super) fn load_flattened(path: &Path) -> Result<String, LoaderError> {
    let raw = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&raw)?;

    let mut lines = Vec::new();
    flatten(&payload, "", &mut lines);
    if lines.is_empty() {
        return Err(LoaderError::NoContent(
            "JSON file does not contain extractable data".to_string(),
        ));
    }

    info!(entries = lines.len(), path = %path.display(), "loaded JSON dataset");
    Ok(lines.join("\n"))
}

fn flatten(payload: &Value, prefix: &str, out: &mut Vec<String>) {
    match payload {
        Value::Object(map) => {
            for (key, value) in map {
                let child = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(value, &child, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                let child = if prefix.is_empty() {
                    format!("[{index}]")
                } else {
                    format!("{prefix}[{index}]")
                };
                flatten(value, &child, out);
            }
        }
        Value::Null => out.push(format!("{prefix}: null")),
        Value::Bool(flag) => out.push(format!("{prefix}: {flag}")),
        Value::Number(number) => out.push(format!("{prefix}: {number}")),
        Value::String(text) => out.push(format!("{prefix}: {text}")),
    }
}

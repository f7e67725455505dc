//! Scheme designer `config.json` handling.
//!
//! The designer's config is published alongside a scheme under
//! `work/config.json`, stripped of anything tied to the machine it ran on.
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::to_pretty_json;

pub const CONFIG_FILE: &str = "config.json";

/// Drop `output_dir` and every `*md5` key, and reduce absolute paths to
/// their file name, at any depth.
pub fn sanitize(config: Value) -> Value {
    match config {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != "output_dir" && !k.ends_with("md5"))
                .map(|(k, v)| (k, sanitize(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(s) => Value::String(strip_absolute(s)),
        other => other,
    }
}

fn strip_absolute(s: String) -> String {
    let path = Path::new(&s);
    if !path.is_absolute() {
        return s;
    }
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or(s)
}

/// `algorithmversion` recorded by the designer, if any.
pub fn algorithmversion(config: &Value) -> Option<String> {
    match config.get("algorithmversion")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

pub fn read(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::json(path, e))
}

/// Pretty-printed (4-space indent, sorted keys) text for `config`.
pub fn to_json_string(config: &Value) -> serde_json::Result<String> {
    to_pretty_json(config)
}

pub fn write(path: &Path, config: &Value) -> Result<()> {
    let text = to_json_string(config).map_err(|e| Error::json(path, e))?;
    std::fs::write(path, text)?;
    Ok(())
}

//! YAML frontmatter parsing and serialization for notes.
//!
//! A note may carry a metadata block at the very start of the file:
//! ```markdown
//! ---
//! remoteId: my-note
//! ---
//! Note content here...
//! ```
//!
//! Malformed frontmatter is never an error: it degrades to "no frontmatter"
//! so a bad parse can never destroy note content.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use thiserror::Error;

/// Frontmatter as a map of string keys to JSON values. JSON values allow
/// flexible typing (strings, numbers, arrays, objects).
pub type Frontmatter = HashMap<String, JsonValue>;

/// Key holding the linked pad's identifier.
pub const REMOTE_ID_KEY: &str = "remoteId";
/// Key holding the timestamp of the last successful pull (RFC 3339).
pub const LAST_SYNCED_KEY: &str = "lastSyncedAt";
/// Transient line-range bookkeeping some editors attach to parsed
/// frontmatter. Derived state, never persisted.
pub const POSITION_KEY: &str = "position";

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("failed to serialize frontmatter: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Split a note into its frontmatter YAML source and body, without parsing
/// the YAML. Returns `(None, raw)` when no well-formed block is present.
///
/// The body is everything strictly after the closing delimiter line, with
/// its line boundaries untouched.
pub fn split(raw: &str) -> (Option<&str>, &str) {
    // The block must start at the very beginning of the file.
    if !raw.starts_with("---") {
        return (None, raw);
    }

    let after_opening = &raw[3..];
    let block = if let Some(rest) = after_opening.strip_prefix("\r\n") {
        rest
    } else if let Some(rest) = after_opening.strip_prefix('\n') {
        rest
    } else {
        // "---" not alone on the first line
        return (None, raw);
    };

    match find_closing_delimiter(block) {
        Some((close_start, close_len)) => {
            let yaml = &block[..close_start];
            let body = &block[close_start + close_len..];
            (Some(yaml), body)
        }
        None => (None, raw),
    }
}

/// Find the closing `---` line. Returns (offset of the delimiter line,
/// length of the line including its trailing newline).
fn find_closing_delimiter(s: &str) -> Option<(usize, usize)> {
    let mut pos = 0;
    while pos <= s.len() {
        let line_end = s[pos..].find('\n').map(|i| pos + i);
        let line = match line_end {
            Some(end) => &s[pos..end],
            None => &s[pos..],
        };
        if line == "---" || line == "---\r" {
            let len = match line_end {
                Some(end) => end - pos + 1,
                None => line.len(),
            };
            return Some((pos, len));
        }
        match line_end {
            Some(end) => pos = end + 1,
            None => break,
        }
    }
    None
}

/// Parse the leading metadata block, if any.
///
/// Returns an owned copy; mutating it never affects the note. Absent,
/// empty, or malformed blocks all yield `None`.
pub fn extract(raw: &str) -> Option<Frontmatter> {
    let (yaml, _) = split(raw);
    yaml.and_then(|src| {
        serde_yaml::from_str::<serde_yaml::Value>(src)
            .ok()
            .and_then(yaml_to_map)
    })
}

/// The note content with any leading metadata block removed.
pub fn body(raw: &str) -> &str {
    split(raw).1
}

/// Render a frontmatter block between `---` delimiters.
///
/// Keys are emitted in sorted order so output is deterministic, and the
/// transient `position` key is always dropped regardless of input.
pub fn serialize(frontmatter: &Frontmatter) -> Result<String, FrontmatterError> {
    let mut keys: Vec<&String> = frontmatter
        .keys()
        .filter(|k| k.as_str() != POSITION_KEY)
        .collect();
    keys.sort();

    let mapping: serde_yaml::Mapping = keys
        .into_iter()
        .map(|k| {
            (
                serde_yaml::Value::String(k.clone()),
                json_to_yaml(&frontmatter[k]),
            )
        })
        .collect();

    let yaml = serde_yaml::to_string(&mapping)?;
    Ok(format!("---\n{}---\n", yaml))
}

/// Build a full note from frontmatter and body. An empty map (after
/// dropping `position`) composes to the bare body.
pub fn compose(frontmatter: &Frontmatter, body: &str) -> Result<String, FrontmatterError> {
    if frontmatter.keys().all(|k| k == POSITION_KEY) {
        return Ok(body.to_string());
    }
    Ok(format!("{}{}", serialize(frontmatter)?, body))
}

/// Shallow-merge `updates` over `existing`; updates win on collision.
/// Side-effect free, the caller performs any write-back.
pub fn merge(existing: Option<&Frontmatter>, updates: Frontmatter) -> Frontmatter {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.extend(updates);
    merged
}

fn yaml_to_map(yaml: serde_yaml::Value) -> Option<Frontmatter> {
    match yaml {
        serde_yaml::Value::Mapping(map) => {
            let mut result = HashMap::new();
            for (k, v) in map {
                if let serde_yaml::Value::String(key) = k {
                    result.insert(key, yaml_to_json(v));
                }
            }
            if result.is_empty() { None } else { Some(result) }
        }
        _ => None,
    }
}

fn yaml_to_json(yaml: serde_yaml::Value) -> JsonValue {
    match yaml {
        serde_yaml::Value::Null => JsonValue::Null,
        serde_yaml::Value::Bool(b) => JsonValue::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(i.into())
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            } else {
                JsonValue::Null
            }
        }
        serde_yaml::Value::String(s) => JsonValue::String(s),
        serde_yaml::Value::Sequence(seq) => {
            JsonValue::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let obj: serde_json::Map<String, JsonValue> = map
                .into_iter()
                .filter_map(|(k, v)| {
                    if let serde_yaml::Value::String(key) = k {
                        Some((key, yaml_to_json(v)))
                    } else {
                        None
                    }
                })
                .collect();
            JsonValue::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn json_to_yaml(json: &JsonValue) -> serde_yaml::Value {
    match json {
        JsonValue::Null => serde_yaml::Value::Null,
        JsonValue::Bool(b) => serde_yaml::Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(i.into())
            } else if let Some(f) = n.as_f64() {
                serde_yaml::Value::Number(f.into())
            } else {
                serde_yaml::Value::Null
            }
        }
        JsonValue::String(s) => serde_yaml::Value::String(s.clone()),
        JsonValue::Array(arr) => serde_yaml::Value::Sequence(arr.iter().map(json_to_yaml).collect()),
        JsonValue::Object(obj) => {
            let map: serde_yaml::Mapping = obj
                .iter()
                .map(|(k, v)| (serde_yaml::Value::String(k.clone()), json_to_yaml(v)))
                .collect();
            serde_yaml::Value::Mapping(map)
        }
    }
}

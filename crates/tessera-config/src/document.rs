//! Configuration documents and where they come from.
//!
//! A document is a [`serde_json::Value`] whose top level is a map. Map key
//! order follows the source document, which matters for breakdown rules and
//! for the tie-break between middlewares sharing the same `order`.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::ConfigError;

/// Origin of a configuration document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    /// A file on disk. JSON unless the extension is `.toml`.
    File(PathBuf),
    /// An in-memory document. References inside it resolve against the
    /// working directory.
    Literal(Value),
}

impl DocumentSource {
    /// Create a file source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Create a literal source.
    #[must_use]
    pub fn literal(document: Value) -> Self {
        Self::Literal(document)
    }
}

impl From<Value> for DocumentSource {
    fn from(document: Value) -> Self {
        Self::Literal(document)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<&str> for DocumentSource {
    fn from(path: &str) -> Self {
        Self::File(PathBuf::from(path))
    }
}

/// Returns an empty document.
#[must_use]
pub fn empty_document() -> Value {
    Value::Object(Map::new())
}

/// Reads and parses a document file.
///
/// A file holding nothing but whitespace is an empty document.
pub async fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::document_not_found(path));
        }
        Err(e) => return Err(ConfigError::read_error(path, e)),
    };

    parse_document(&content, path)
}

/// Parses document content. The format is picked from the file extension.
pub fn parse_document(content: &str, path: &Path) -> Result<Value, ConfigError> {
    if content.trim().is_empty() {
        return Ok(empty_document());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let value = match extension.as_deref() {
        Some("toml") => {
            let table: toml::Table = toml::from_str(content)
                .map_err(|e| ConfigError::parse_error(path, e.to_string()))?;
            serde_json::to_value(table).map_err(|e| ConfigError::parse_error(path, e.to_string()))?
        }
        _ => serde_json::from_str(content)
            .map_err(|e| ConfigError::parse_error(path, e.to_string()))?,
    };

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(empty_document()),
        other => Err(ConfigError::parse_error(
            path,
            format!("top-level value must be a map, found {}", kind_of(&other)),
        )),
    }
}

/// Looks up a dot-separated property path. Numeric segments index sequences.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Assigns `value` at a dot-separated property path, creating maps on the way.
///
/// Numeric segments index into sequences, which grow with nulls when the
/// index is past the end. Other non-map values found on the path are replaced.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    for segment in path.split('.') {
        current = slot(current, segment);
    }
    *current = value;
}

fn slot<'v>(current: &'v mut Value, segment: &str) -> &'v mut Value {
    let index = match current {
        Value::Array(_) => segment.parse::<usize>().ok(),
        _ => None,
    };
    if index.is_none() && !current.is_object() {
        *current = empty_document();
    }

    match (current, index) {
        (Value::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (Value::Object(map), _) => map.entry(segment.to_string()).or_insert(Value::Null),
        (other, _) => other,
    }
}

/// Short name of a value's kind, for error messages.
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

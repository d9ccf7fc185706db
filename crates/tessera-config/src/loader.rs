//! Configuration chain loading.
//!
//! A document may name other documents it builds on:
//!
//! - `baseConfig`: a single base document,
//! - `extends`: a list of documents merged in left to right.
//!
//! For one document the result is its `baseConfig` chain, then each `extends`
//! entry, then the document itself, each merged over the previous result.
//! Protocol references are resolved in every document before its own
//! references are followed, so `"baseConfig": "path:../base.json"` works.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::breakdown::apply_breakdown;
use crate::document::{empty_document, kind_of, read_document, DocumentSource};
use crate::merge::merge;
use crate::protocol::{resolve_document, ProtocolRegistry};
use crate::ConfigError;

/// Key naming a document's single base document.
pub const BASE_CONFIG_KEY: &str = "baseConfig";

/// Key listing additional documents to merge in.
pub const EXTENDS_KEY: &str = "extends";

/// Loads configuration documents and their inheritance chains.
///
/// # Example
///
/// ```no_run
/// use tessera_config::ConfigLoader;
///
/// # async fn run() -> Result<(), tessera_config::ConfigError> {
/// let document = ConfigLoader::new().load("config/app.json").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    registry: ProtocolRegistry,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader using the built-in protocol resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ProtocolRegistry::with_defaults(),
        }
    }

    /// Replace the protocol registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ProtocolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The protocol registry in use.
    #[must_use]
    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Loads a document with its whole chain merged in.
    ///
    /// `baseConfig` and `extends` are consumed and do not appear in the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any document in the chain is missing or
    /// malformed, a protocol reference fails, a document inherits from
    /// itself, or `baseConfig`/`extends` have the wrong type.
    pub async fn load(&self, source: impl Into<DocumentSource>) -> Result<Value, ConfigError> {
        let mut chain = Vec::new();
        self.load_source(source.into(), &mut chain).await
    }

    /// Loads a document and then fills derived values from its `breakDown` rules.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`].
    pub async fn resolve(&self, source: impl Into<DocumentSource>) -> Result<Value, ConfigError> {
        let document = self.load(source).await?;
        Ok(apply_breakdown(&document))
    }

    fn load_source<'a>(
        &'a self,
        source: DocumentSource,
        chain: &'a mut Vec<PathBuf>,
    ) -> BoxFuture<'a, Result<Value, ConfigError>> {
        Box::pin(async move {
            match source {
                DocumentSource::File(path) => {
                    let canonical = canonicalize(&path).await?;
                    if chain.contains(&canonical) {
                        return Err(ConfigError::CyclicInheritance {
                            path: canonical,
                            chain: chain.clone(),
                        });
                    }

                    let raw = read_document(&canonical).await?;
                    tracing::debug!(path = %canonical.display(), "loaded configuration document");

                    let base_dir = canonical
                        .parent()
                        .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);

                    chain.push(canonical);
                    let result = self.load_document(raw, &base_dir, chain).await;
                    chain.pop();
                    result
                }
                DocumentSource::Literal(value) => {
                    let raw = match value {
                        Value::Object(_) => value,
                        Value::Null => empty_document(),
                        other => {
                            return Err(ConfigError::parse_error(
                                "<literal>",
                                format!("top-level value must be a map, found {}", kind_of(&other)),
                            ));
                        }
                    };
                    let base_dir = std::env::current_dir()
                        .map_err(|e| ConfigError::read_error(".", e))?;
                    self.load_document(raw, &base_dir, chain).await
                }
            }
        })
    }

    async fn load_document(
        &self,
        raw: Value,
        base_dir: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Value, ConfigError> {
        let resolved = resolve_document(&raw, &self.registry, base_dir).await?;
        let mut map = match resolved {
            Value::Object(map) => map,
            // a resolver cannot replace the whole document
            _ => Map::new(),
        };

        let base = take_base_config(&mut map)?;
        let extends = take_extends(&mut map)?;

        let mut result = empty_document();
        if let Some(base) = base {
            let source = DocumentSource::File(base_dir.join(base));
            result = self.load_source(source, chain).await?;
        }
        for entry in extends {
            let source = DocumentSource::File(base_dir.join(entry));
            let extended = self.load_source(source, chain).await?;
            result = merge(&result, &extended);
        }

        Ok(merge(&result, &Value::Object(map)))
    }
}

async fn canonicalize(path: &Path) -> Result<PathBuf, ConfigError> {
    match tokio::fs::canonicalize(path).await {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::document_not_found(path))
        }
        Err(e) => Err(ConfigError::read_error(path, e)),
    }
}

fn take_base_config(map: &mut Map<String, Value>) -> Result<Option<String>, ConfigError> {
    match map.remove(BASE_CONFIG_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(reference)) => Ok(Some(reference)),
        Some(other) => Err(ConfigError::invalid_value(
            BASE_CONFIG_KEY,
            format!("expected a string, found {}", kind_of(&other)),
        )),
    }
}

fn take_extends(map: &mut Map<String, Value>) -> Result<Vec<String>, ConfigError> {
    match map.remove(EXTENDS_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(reference) => Ok(reference),
                other => Err(ConfigError::invalid_value(
                    format!("{EXTENDS_KEY}.{index}"),
                    format!("expected a string, found {}", kind_of(&other)),
                )),
            })
            .collect(),
        Some(other) => Err(ConfigError::invalid_value(
            EXTENDS_KEY,
            format!("expected a sequence of strings, found {}", kind_of(&other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_single_document() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{"server": {"listener": {"port": 8080}}}"#);
        let doc = ConfigLoader::new().load(path).await.unwrap();
        assert_eq!(doc, json!({"server": {"listener": {"port": 8080}}}));
    }

    #[tokio::test]
    async fn test_load_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.json", "");
        assert_eq!(ConfigLoader::new().load(path).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::new()
            .load(dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_base_config_merged_under_document() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.json", r#"{"a": 1, "b": {"c": 1, "d": 1}}"#);
        let path = write(&dir, "app.json", r#"{"baseConfig": "base.json", "b": {"c": 2}}"#);
        let doc = ConfigLoader::new().load(path).await.unwrap();
        assert_eq!(doc, json!({"a": 1, "b": {"c": 2, "d": 1}}));
    }

    #[tokio::test]
    async fn test_base_then_extends_then_document() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.json", r#"{"v": "base", "base": true}"#);
        write(&dir, "one.json", r#"{"v": "one", "one": true}"#);
        write(&dir, "two.json", r#"{"v": "two", "two": true}"#);
        let path = write(
            &dir,
            "app.json",
            r#"{"baseConfig": "base.json", "extends": ["one.json", "two.json"]}"#,
        );
        let doc = ConfigLoader::new().load(path).await.unwrap();
        assert_eq!(
            doc,
            json!({"v": "two", "base": true, "one": true, "two": true})
        );
    }

    #[tokio::test]
    async fn test_self_reference_is_cyclic() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "loop.json", r#"{"baseConfig": "loop.json"}"#);
        let err = ConfigLoader::new().load(path).await.unwrap_err();
        assert!(matches!(err, ConfigError::CyclicInheritance { .. }));
    }

    #[tokio::test]
    async fn test_diamond_is_allowed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "root.json", r#"{"root": 1}"#);
        write(&dir, "left.json", r#"{"baseConfig": "root.json", "left": 1}"#);
        write(&dir, "right.json", r#"{"baseConfig": "root.json", "right": 1}"#);
        let path = write(&dir, "app.json", r#"{"extends": ["left.json", "right.json"]}"#);
        let doc = ConfigLoader::new().load(path).await.unwrap();
        assert_eq!(doc, json!({"root": 1, "left": 1, "right": 1}));
    }

    #[tokio::test]
    async fn test_extends_must_be_sequence() {
        let err = ConfigLoader::new()
            .load(json!({"extends": "base.json"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "extends"));
    }

    #[tokio::test]
    async fn test_extends_elements_must_be_strings() {
        let err = ConfigLoader::new()
            .load(json!({"extends": [1, 2, 3]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "extends.0"));
    }

    #[tokio::test]
    async fn test_base_config_must_be_string() {
        let err = ConfigLoader::new()
            .load(json!({"baseConfig": {"x": 1}}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "baseConfig"));
    }

    #[tokio::test]
    async fn test_literal_rejects_non_map() {
        let err = ConfigLoader::new().load(json!([1])).await.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_protocol_reference_in_base_config() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared/base.json"), r#"{"shared": "yes"}"#).unwrap();
        let path = write(&dir, "app.json", r#"{"baseConfig": "path:shared/base.json"}"#);
        let doc = ConfigLoader::new().load(path).await.unwrap();
        assert_eq!(doc, json!({"shared": "yes"}));
    }

    #[tokio::test]
    async fn test_resolve_applies_breakdown() {
        let doc = ConfigLoader::new()
            .resolve(json!({"b": 2, "breakDown": {"a": "b"}}))
            .await
            .unwrap();
        assert_eq!(doc["a"], 2);
    }
}

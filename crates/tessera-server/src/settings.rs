//! Free-form engine settings.
//!
//! The `server.express` section is not interpreted by tessera itself. Its
//! entries are kept, in declaration order, for the host and its middlewares
//! to read.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Engine settings by name.
///
/// ```
/// use serde_json::json;
/// use tessera_server::EngineSettings;
///
/// let settings = EngineSettings::from_map(
///     json!({"trust proxy": true, "x-powered-by": false}).as_object().unwrap(),
/// );
/// assert_eq!(settings.get("trust proxy"), Some(&json!(true)));
/// assert!(settings.enabled("trust proxy"));
/// assert!(!settings.enabled("x-powered-by"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    entries: IndexMap<String, Value>,
}

impl EngineSettings {
    /// No settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from a configuration map.
    #[must_use]
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            entries: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Sets a value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(name.into(), value)
    }

    /// The value of a setting.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Whether a setting is present and `true`.
    #[must_use]
    pub fn enabled(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Value::Bool(true)))
    }

    /// Settings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

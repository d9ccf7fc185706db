//! Typed view of a validated configuration document.
//!
//! Obtained from [`validate`](crate::validate). Free-form sections
//! (`server.express`, `template`, middleware `config`) stay as JSON values.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Listener host used when none is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Listener port used when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// A validated configuration document.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_config::{validate, LogLevel};
///
/// let config = validate(&json!({
///     "server": {"listener": {"port": "3000"}, "logLevel": "debug"}
/// }))
/// .unwrap();
///
/// assert_eq!(config.listener_port(), 3000);
/// assert_eq!(config.listener_host(), "0.0.0.0");
/// assert_eq!(config.log_level(), LogLevel::Debug);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    /// Additional documents this one was built from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    /// Server section.
    #[serde(default)]
    pub server: ServerSection,

    /// Flat scalar values shared with every middleware.
    #[serde(default)]
    pub globals: Map<String, Value>,

    /// Template engine settings, free-form.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub template: Value,

    /// Declared middlewares by name, in declaration order.
    #[serde(default)]
    pub middlewares: IndexMap<String, MiddlewareEntry>,

    /// Derived value rules.
    #[serde(default, rename = "breakDown", skip_serializing_if = "Map::is_empty")]
    pub break_down: Map<String, Value>,
}

impl TesseraConfig {
    /// Configured listener host, or [`DEFAULT_HOST`].
    #[must_use]
    pub fn listener_host(&self) -> &str {
        self.server.listener.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Configured listener port, or [`DEFAULT_PORT`].
    #[must_use]
    pub fn listener_port(&self) -> u16 {
        self.server.listener.port.map_or(DEFAULT_PORT, Port::get)
    }

    /// Configured log level, or [`LogLevel::Info`].
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.server.log_level.unwrap_or_default()
    }
}

/// `server` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerSection {
    /// Listening socket.
    #[serde(default)]
    pub listener: ListenerSection,

    /// Process log level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Free-form settings handed to the HTTP engine.
    #[serde(default)]
    pub express: Map<String, Value>,
}

/// `server.listener` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerSection {
    /// Bind host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Bind port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,
}

/// A TCP port. Deserialises from an integer or a string holding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PortValue")]
pub struct Port(u16);

impl Port {
    /// Wrap a port number.
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    /// The port number.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl TryFrom<PortValue> for Port {
    type Error = String;

    fn try_from(value: PortValue) -> Result<Self, Self::Error> {
        let number = match value {
            PortValue::Number(n) => n,
            PortValue::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("`{s}` is not a port number"))?,
        };
        u16::try_from(number)
            .map(Port)
            .map_err(|_| format!("{number} is outside the TCP port range"))
    }
}

/// Accepted values of `server.logLevel`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Unrecoverable errors only.
    Fatal,
    /// Errors.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational messages and above.
    #[default]
    Info,
    /// Debug output and above.
    Debug,
    /// Everything.
    Trace,
    /// No output.
    Silent,
}

impl LogLevel {
    /// All accepted names.
    pub const NAMES: [&'static str; 7] =
        ["fatal", "error", "warn", "info", "debug", "trace", "silent"];

    /// The configuration name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Silent => "silent",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `middlewares` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareEntry {
    /// Module reference, resolved by the host's module loader.
    pub module: String,

    /// Position in the pipeline, ascending. Defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,

    /// Path prefixes. Defaults to `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<OneOrMany>,

    /// HTTP methods. Defaults to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<OneOrMany>,

    /// Host patterns. Defaults to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<OneOrMany>,

    /// Settings passed to the middleware factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// A single string or a sequence of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value.
    One(String),
    /// Several values.
    Many(Vec<String>),
}

impl OneOrMany {
    /// The values as a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

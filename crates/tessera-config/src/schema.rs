//! Shape validation of resolved documents.
//!
//! Validation walks the document section by section so that every error names
//! the offending field, then deserialises it into a [`TesseraConfig`]. The
//! document itself is never modified.

use serde_json::{Map, Value};

use crate::breakdown::BREAKDOWN_KEY;
use crate::config::{LogLevel, TesseraConfig};
use crate::document::kind_of;
use crate::ConfigError;

/// Keys accepted at the top level of a document.
pub const TOP_LEVEL_KEYS: [&str; 6] = [
    "extends",
    "server",
    "globals",
    "template",
    "middlewares",
    BREAKDOWN_KEY,
];

const SERVER_KEYS: [&str; 3] = ["listener", "logLevel", "express"];
const LISTENER_KEYS: [&str; 2] = ["host", "port"];
const MIDDLEWARE_KEYS: [&str; 6] = ["module", "order", "paths", "methods", "hosts", "config"];

const ROOT_SECTION: &str = "<root>";

/// Validates a resolved document and returns its typed view.
///
/// An empty document is valid; so is any subset of the recognised sections.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownField`], [`ConfigError::InvalidValue`] or
/// [`ConfigError::MissingField`] describing the first violation found.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_config::validate;
///
/// assert!(validate(&json!({})).is_ok());
/// assert!(validate(&json!({"thisFieldIsNotSupported": true})).is_err());
/// ```
pub fn validate(document: &Value) -> Result<TesseraConfig, ConfigError> {
    let root = match document {
        Value::Null => return Ok(TesseraConfig::default()),
        other => expect_map(other, ROOT_SECTION)?,
    };
    check_keys(root, &TOP_LEVEL_KEYS, ROOT_SECTION)?;

    if let Some(extends) = root.get("extends") {
        validate_extends(extends)?;
    }
    if let Some(server) = root.get("server") {
        validate_server(server)?;
    }
    if let Some(globals) = root.get("globals") {
        validate_globals(globals)?;
    }
    if let Some(middlewares) = root.get("middlewares") {
        validate_middlewares(middlewares)?;
    }
    if let Some(rules) = root.get(BREAKDOWN_KEY) {
        expect_map(rules, BREAKDOWN_KEY)?;
    }

    serde_json::from_value(document.clone())
        .map_err(|e| ConfigError::invalid_value(ROOT_SECTION, e.to_string()))
}

fn expect_map<'v>(value: &'v Value, field: &str) -> Result<&'v Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| {
        ConfigError::invalid_value(field, format!("expected a map, found {}", kind_of(value)))
    })
}

fn check_keys(map: &Map<String, Value>, allowed: &[&str], section: &str) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(unknown) => Err(ConfigError::unknown_field(unknown.as_str(), section)),
        None => Ok(()),
    }
}

fn validate_extends(extends: &Value) -> Result<(), ConfigError> {
    let Value::Array(items) = extends else {
        return Err(ConfigError::invalid_value(
            "extends",
            format!("expected a sequence of strings, found {}", kind_of(extends)),
        ));
    };
    for (index, item) in items.iter().enumerate() {
        if !item.is_string() {
            return Err(ConfigError::invalid_value(
                format!("extends.{index}"),
                format!("expected a string, found {}", kind_of(item)),
            ));
        }
    }
    Ok(())
}

fn validate_server(server: &Value) -> Result<(), ConfigError> {
    let server = expect_map(server, "server")?;
    check_keys(server, &SERVER_KEYS, "server")?;

    if let Some(listener) = server.get("listener") {
        let listener = expect_map(listener, "server.listener")?;
        check_keys(listener, &LISTENER_KEYS, "server.listener")?;

        if let Some(host) = listener.get("host") {
            if !host.is_string() {
                return Err(ConfigError::invalid_value(
                    "server.listener.host",
                    format!("expected a string, found {}", kind_of(host)),
                ));
            }
        }
        if let Some(port) = listener.get("port") {
            validate_port(port)?;
        }
    }

    if let Some(level) = server.get("logLevel") {
        let valid = level
            .as_str()
            .is_some_and(|name| LogLevel::NAMES.contains(&name));
        if !valid {
            return Err(ConfigError::invalid_value(
                "server.logLevel",
                format!("expected one of {}", LogLevel::NAMES.join(", ")),
            ));
        }
    }

    if let Some(express) = server.get("express") {
        expect_map(express, "server.express")?;
    }

    Ok(())
}

fn validate_port(port: &Value) -> Result<(), ConfigError> {
    const FIELD: &str = "server.listener.port";

    let number = match port {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        other => {
            return Err(ConfigError::invalid_value(
                FIELD,
                format!("expected an integer, found {}", kind_of(other)),
            ));
        }
    };
    match number {
        Some(n) if n <= u64::from(u16::MAX) => Ok(()),
        Some(n) => Err(ConfigError::invalid_value(
            FIELD,
            format!("{n} is outside the TCP port range 0-65535"),
        )),
        None => Err(ConfigError::invalid_value(
            FIELD,
            format!("`{port}` is not a valid port number"),
        )),
    }
}

fn validate_globals(globals: &Value) -> Result<(), ConfigError> {
    let globals = expect_map(globals, "globals")?;
    for (key, value) in globals {
        if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
            return Err(ConfigError::invalid_value(
                format!("globals.{key}"),
                format!("expected a string, number or boolean, found {}", kind_of(value)),
            ));
        }
    }
    Ok(())
}

fn validate_middlewares(middlewares: &Value) -> Result<(), ConfigError> {
    let middlewares = expect_map(middlewares, "middlewares")?;
    for (name, entry) in middlewares {
        let section = format!("middlewares.{name}");
        let entry = expect_map(entry, &section)?;
        check_keys(entry, &MIDDLEWARE_KEYS, &section)?;

        match entry.get("module") {
            None | Some(Value::Null) => {
                return Err(ConfigError::missing_field(format!("{section}.module")));
            }
            Some(Value::String(_)) => {}
            Some(other) => {
                return Err(ConfigError::invalid_value(
                    format!("{section}.module"),
                    format!("expected a string, found {}", kind_of(other)),
                ));
            }
        }

        if let Some(order) = entry.get("order") {
            if !order.is_number() {
                return Err(ConfigError::invalid_value(
                    format!("{section}.order"),
                    format!("expected a number, found {}", kind_of(order)),
                ));
            }
        }

        for key in ["paths", "methods", "hosts"] {
            if let Some(value) = entry.get(key) {
                validate_string_or_list(value, &format!("{section}.{key}"))?;
            }
        }

        if let Some(config) = entry.get("config") {
            expect_map(config, &format!("{section}.config"))?;
        }
    }
    Ok(())
}

fn validate_string_or_list(value: &Value, field: &str) -> Result<(), ConfigError> {
    let valid = match value {
        Value::String(_) => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(
            field,
            format!("expected a string or a sequence of strings, found {}", kind_of(value)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejects(document: Value) -> ConfigError {
        validate(&document).expect_err("document should be rejected")
    }

    #[test]
    fn test_empty_document() {
        assert!(validate(&json!({})).is_ok());
        assert!(validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_unknown_top_level_field() {
        let err = rejects(json!({"thisFieldIsNotSupported": true}));
        assert!(
            matches!(err, ConfigError::UnknownField { ref field, .. } if field == "thisFieldIsNotSupported")
        );
    }

    #[test]
    fn test_empty_sections() {
        let config = validate(&json!({
            "extends": [],
            "globals": {},
            "server": {},
            "middlewares": {}
        }))
        .unwrap();
        assert!(config.middlewares.is_empty());
    }

    #[test]
    fn test_extends() {
        assert!(validate(&json!({"extends": ["path"]})).is_ok());
        assert!(validate(&json!({"extends": ["path1", "path2", "path3"]})).is_ok());

        let err = rejects(json!({"extends": "this is a string instead of an array"}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "extends"));

        let err = rejects(json!({"extends": [1, 2, 3]}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "extends.0"));
    }

    #[test]
    fn test_valid_server() {
        assert!(validate(&json!({"server": {}})).is_ok());
        assert!(validate(&json!({"server": {"listener": {}, "express": {}}})).is_ok());
        let config = validate(&json!({
            "server": {"listener": {"port": 8080}, "express": {"foo": "bar"}}
        }))
        .unwrap();
        assert_eq!(config.listener_port(), 8080);
        assert_eq!(config.server.express["foo"], "bar");
    }

    #[test]
    fn test_server_must_be_map() {
        let err = rejects(json!({"server": "this is a string instead of an object"}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server"));
    }

    #[test]
    fn test_server_unknown_field() {
        let err = rejects(json!({
            "server": {"listener": {}, "express": {}, "unsupportedField": true}
        }));
        assert!(matches!(
            err,
            ConfigError::UnknownField { ref field, ref section } if field == "unsupportedField" && section == "server"
        ));
    }

    #[test]
    fn test_port_range() {
        let err = rejects(json!({"server": {"listener": {"port": 808_080}, "express": {}}}));
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server.listener.port")
        );
        assert!(validate(&json!({"server": {"listener": {"port": 0}}})).is_ok());
        assert!(validate(&json!({"server": {"listener": {"port": 65535}}})).is_ok());
        assert!(validate(&json!({"server": {"listener": {"port": 65536}}})).is_err());
        assert!(validate(&json!({"server": {"listener": {"port": -1}}})).is_err());
        assert!(validate(&json!({"server": {"listener": {"port": 80.5}}})).is_err());
    }

    #[test]
    fn test_port_as_string() {
        let config = validate(&json!({"server": {"listener": {"port": "9000"}}})).unwrap();
        assert_eq!(config.listener_port(), 9000);
        assert!(validate(&json!({"server": {"listener": {"port": "http"}}})).is_err());
    }

    #[test]
    fn test_listener_unknown_field() {
        let err = rejects(json!({
            "server": {"listener": {"port": 8080, "unsupportedField": true}, "express": {}}
        }));
        assert!(matches!(
            err,
            ConfigError::UnknownField { ref section, .. } if section == "server.listener"
        ));
    }

    #[test]
    fn test_log_level() {
        assert!(validate(&json!({"server": {"logLevel": "silent"}})).is_ok());
        let err = rejects(json!({"server": {"logLevel": "verbose"}}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server.logLevel"));
    }

    #[test]
    fn test_globals() {
        assert!(validate(&json!({"globals": {}})).is_ok());
        assert!(validate(&json!({"globals": {"foo": "bar", "jon": "doe"}})).is_ok());
        assert!(validate(&json!({"globals": {"n": 1, "b": true}})).is_ok());

        let err = rejects(json!({"globals": "this is a string instead of an object"}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "globals"));

        let err = rejects(json!({"globals": {"foo": {"bar": "baz"}}}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "globals.foo"));
    }

    #[test]
    fn test_valid_middlewares() {
        assert!(validate(&json!({"middlewares": {}})).is_ok());
        assert!(validate(&json!({
            "middlewares": {"module": {"order": 42, "module": "module"}}
        }))
        .is_ok());
        assert!(validate(&json!({
            "middlewares": {"module": {"order": 42, "module": "module", "config": {"foo": "bar", "baz": null}}}
        }))
        .is_ok());

        let config = validate(&json!({
            "middlewares": {
                "module": {
                    "order": 42,
                    "module": "module",
                    "paths": ["/a", "/b"],
                    "methods": "GET",
                    "config": {"foo": {"bar": "baz"}}
                }
            }
        }))
        .unwrap();
        let entry = &config.middlewares["module"];
        assert_eq!(entry.order, Some(42.0));
        assert_eq!(entry.paths.as_ref().map(|p| p.to_vec()), Some(vec!["/a".into(), "/b".into()]));
    }

    #[test]
    fn test_middlewares_must_be_map() {
        let err = rejects(json!({"middlewares": "this is a string instead of an object"}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "middlewares"));
    }

    #[test]
    fn test_middleware_entry_must_be_map() {
        let err = rejects(json!({"middlewares": {"order": 42, "name": "module"}}));
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "middlewares.order")
        );
    }

    #[test]
    fn test_middleware_requires_module() {
        let err = rejects(json!({"middlewares": {"module": {"order": 42}}}));
        assert!(
            matches!(err, ConfigError::MissingField { ref field } if field == "middlewares.module.module")
        );
    }

    #[test]
    fn test_middleware_scope_values() {
        let err = rejects(json!({"middlewares": {"m": {"module": "m", "hosts": [1]}}}));
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "middlewares.m.hosts"));
    }

    #[test]
    fn test_removing_unknown_key_restores_acceptance() {
        let mut document = json!({
            "server": {"listener": {"port": 8080, "extra": 1}},
            "middlewares": {"m": {"module": "m"}}
        });
        assert!(validate(&document).is_err());
        document["server"]["listener"]
            .as_object_mut()
            .unwrap()
            .remove("extra");
        assert!(validate(&document).is_ok());
    }

    #[test]
    fn test_break_down_section_accepted() {
        let config = validate(&json!({"breakDown": {"a": "b", "c": null}})).unwrap();
        assert_eq!(config.break_down.len(), 2);
        assert!(validate(&json!({"breakDown": "a"})).is_err());
    }

    #[test]
    fn test_template_is_free_form() {
        let config = validate(&json!({"template": {"engine": "x", "nested": [1, {"a": null}]}}))
            .unwrap();
        assert_eq!(config.template["engine"], "x");
    }

    #[test]
    fn test_input_not_mutated() {
        let document = json!({"server": {"listener": {"port": "80"}}});
        let before = document.clone();
        let _ = validate(&document).unwrap();
        assert_eq!(document, before);
    }
}

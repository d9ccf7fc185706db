//! Derived values declared under `breakDown`.
//!
//! Each entry of the `breakDown` map names a target property path and a rule.
//! The rule is only evaluated when the target is absent or `null`; explicit
//! configuration is never overwritten.
//!
//! ```json
//! {
//!   "breakDown": {
//!     "server.listener.port": ["env.PORT", "defaults.port"],
//!     "template.root": "paths.views",
//!     "globals": { "title": "untitled" }
//!   }
//! }
//! ```

use serde_json::Value;

use crate::document::{get_path, set_path};

/// Top-level key holding the rules.
pub const BREAKDOWN_KEY: &str = "breakDown";

/// How a missing property gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakdownRule {
    /// Assign a copy of a literal value.
    Literal(Value),
    /// Copy the value found at another property path.
    CopyFrom(String),
    /// Copy the value of the first listed path that is present.
    FirstOf(Vec<String>),
}

impl BreakdownRule {
    /// Interprets a rule declaration. `null` declares nothing.
    #[must_use]
    pub fn from_value(rule: &Value) -> Option<Self> {
        match rule {
            Value::Null => None,
            Value::String(path) => Some(Self::CopyFrom(path.clone())),
            Value::Array(paths) => Some(Self::FirstOf(
                paths
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            )),
            literal => Some(Self::Literal(literal.clone())),
        }
    }

    /// Computes the value for the target, or `None` to leave it unset.
    #[must_use]
    pub fn evaluate(&self, document: &Value) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::CopyFrom(path) => get_path(document, path).cloned(),
            Self::FirstOf(paths) => paths
                .iter()
                .find_map(|path| get_path(document, path))
                .cloned(),
        }
    }
}

fn is_unset(document: &Value, path: &str) -> bool {
    get_path(document, path).map_or(true, Value::is_null)
}

/// Applies the document's own `breakDown` rules, in declaration order.
///
/// Later rules see values assigned by earlier ones. The input is not
/// modified; the `breakDown` section is kept in the result.
#[must_use]
pub fn apply_breakdown(document: &Value) -> Value {
    let mut resolved = document.clone();

    let Some(rules) = document.get(BREAKDOWN_KEY).and_then(Value::as_object) else {
        return resolved;
    };

    for (target, declaration) in rules {
        if !is_unset(&resolved, target) {
            continue;
        }
        let Some(rule) = BreakdownRule::from_value(declaration) else {
            continue;
        };
        if let Some(value) = rule.evaluate(&resolved) {
            tracing::debug!(target_path = %target, "filled property from breakDown rule");
            set_path(&mut resolved, target, value);
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_never_overwrites_set_property() {
        let doc = json!({"a": 1, "breakDown": {"a": "b"}, "b": 2});
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["a"], 1);
    }

    #[test]
    fn test_first_present_alternative() {
        let doc = json!({"y": 5, "breakDown": {"x": ["w", "y"]}});
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["x"], 5);
    }

    #[test]
    fn test_null_target_counts_as_unset() {
        let doc = json!({"x": null, "y": 5, "breakDown": {"x": "y"}});
        assert_eq!(apply_breakdown(&doc)["x"], 5);
    }

    #[test]
    fn test_no_alternative_leaves_unset() {
        let doc = json!({"breakDown": {"x": ["w", "v"]}});
        let resolved = apply_breakdown(&doc);
        assert!(resolved.get("x").is_none());
    }

    #[test]
    fn test_copy_from_absent_path_leaves_unset() {
        let doc = json!({"breakDown": {"x": "nowhere"}});
        assert!(apply_breakdown(&doc).get("x").is_none());
    }

    #[test]
    fn test_literal_map_is_copied() {
        let doc = json!({"breakDown": {"globals": {"title": "untitled"}}});
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["globals"], json!({"title": "untitled"}));
        assert_eq!(resolved["breakDown"]["globals"], json!({"title": "untitled"}));
    }

    #[test]
    fn test_nested_target_paths() {
        let doc = json!({
            "defaults": {"port": 3000},
            "breakDown": {"server.listener.port": ["env.PORT", "defaults.port"]}
        });
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["server"]["listener"]["port"], 3000);
    }

    #[test]
    fn test_target_inside_sequence_keeps_siblings() {
        let doc = json!({"list": [null, 2], "v": 1, "breakDown": {"list.0": "v"}});
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["list"], json!([1, 2]));
    }

    #[test]
    fn test_rules_run_in_declaration_order() {
        let doc = json!({
            "c": "value",
            "breakDown": {"b": "c", "a": "b"}
        });
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["b"], "value");
        assert_eq!(resolved["a"], "value");
    }

    #[test]
    fn test_null_rule_ignored() {
        let doc = json!({"breakDown": {"x": null}});
        assert!(apply_breakdown(&doc).get("x").is_none());
    }

    #[test]
    fn test_scalar_literal_rules() {
        let doc = json!({"breakDown": {"n": 7, "flag": false}});
        let resolved = apply_breakdown(&doc);
        assert_eq!(resolved["n"], 7);
        assert_eq!(resolved["flag"], false);
    }

    #[test]
    fn test_document_without_rules_unchanged() {
        let doc = json!({"a": 1});
        assert_eq!(apply_breakdown(&doc), doc);
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!(BreakdownRule::from_value(&json!(null)), None);
        assert_eq!(
            BreakdownRule::from_value(&json!(["a", 1, "b"])),
            Some(BreakdownRule::FirstOf(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            BreakdownRule::from_value(&json!("x.y")),
            Some(BreakdownRule::CopyFrom("x.y".into()))
        );
    }
}

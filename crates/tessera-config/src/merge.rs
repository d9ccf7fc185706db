//! Deep merge of configuration documents.
//!
//! Maps merge key by key, recursively. Sequences merge position by position:
//! element `i` of the overlay is merged over element `i` of the base, and base
//! elements past the end of the overlay are kept. Any other pairing is a plain
//! replacement by the overlay value.

use serde_json::Value;

/// Merges `overlay` on top of `base`, returning a new value.
///
/// Neither input is modified.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_config::merge;
///
/// let base = json!({"server": {"listener": {"port": 1}}});
/// let overlay = json!({"server": {"listener": {"host": "h"}}});
///
/// assert_eq!(
///     merge(&base, &overlay),
///     json!({"server": {"listener": {"port": 1, "host": "h"}}})
/// );
/// ```
#[must_use]
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => {
            let mut merged = Vec::with_capacity(base_items.len().max(overlay_items.len()));
            for (index, overlay_item) in overlay_items.iter().enumerate() {
                match base_items.get(index) {
                    Some(base_item) => merged.push(merge(base_item, overlay_item)),
                    None => merged.push(overlay_item.clone()),
                }
            }
            merged.extend(base_items.iter().skip(overlay_items.len()).cloned());
            Value::Array(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Folds a sequence of documents, each merged over the result of the previous.
#[must_use]
pub fn merge_all<'a, I>(documents: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    documents
        .into_iter()
        .fold(crate::document::empty_document(), |acc, doc| merge(&acc, doc))
}

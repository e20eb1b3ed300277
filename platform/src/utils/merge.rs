//! Recursive merging of JSON objects.

use serde_json::{Map, Value};

/// Merge `updates` into a copy of `base`, left to right.
///
/// When both sides hold an object under the same key the objects are
/// merged recursively. Any other value replaces what was there.
///
/// # Examples
/// ```
/// use platform_kit::utils::deep_update;
/// use serde_json::json;
///
/// let base = json!({"db": {"host": "localhost", "port": 5432}});
/// let patch = json!({"db": {"port": 6432}});
/// let merged = deep_update(
///     base.as_object().expect("object"),
///     [patch.as_object().expect("object")],
/// );
/// assert_eq!(
///     serde_json::Value::Object(merged),
///     json!({"db": {"host": "localhost", "port": 6432}})
/// );
/// ```
#[must_use]
pub fn deep_update<'a, I>(base: &Map<String, Value>, updates: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut result = base.clone();
    for update in updates {
        for (key, value) in update {
            let merged = match (result.get(key), value) {
                (Some(Value::Object(current)), Value::Object(incoming)) => {
                    Value::Object(deep_update(current, [incoming]))
                }
                _ => value.clone(),
            };
            result.insert(key.clone(), merged);
        }
    }
    result
}

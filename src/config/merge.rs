//! Deep merge for configuration trees.
//!
//! Implements key-by-key merging where the overlay wins on conflicting keys.
//! Arrays are replaced entirely, not concatenated, and key order follows the
//! base document with new overlay keys appended.

use serde_json::Value;

/// Deep merge two config values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use schemactl::config::deep_merge;
///
/// let base = json!({
///     "resources": { "db": { "adapter": "pdo_sqlite", "params": { "dbname": "app.db" } } }
/// });
/// let overlay = json!({
///     "resources": { "db": { "params": { "dbname": "local.db" } } }
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result["resources"]["db"]["adapter"], "pdo_sqlite");
/// assert_eq!(result["resources"]["db"]["params"]["dbname"], "local.db");
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                // Merge in place so the base key keeps its position.
                if let Some(base_value) = base_map.get_mut(&key) {
                    let taken = base_value.take();
                    *base_value = deep_merge(taken, overlay_value);
                } else {
                    base_map.insert(key, overlay_value);
                }
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

//! Field-by-field merging of configuration tiers.
//!
//! Tiers are parsed into `serde_json::Value` and folded together so that a
//! higher tier only needs to mention the keys it changes.

use serde_json::Value;

/// Merge `overlay` onto `base`.
///
/// Maps merge key by key. Any other overlay value replaces the base value
/// outright, except `null`, which leaves the base untouched so that a key
/// written as `port: ~` does not erase the default.
///
/// ```
/// use kanban_tracker::config::deep_merge;
/// use serde_json::json;
///
/// let defaults = json!({"server": {"host": "127.0.0.1", "port": 3000}});
/// let project = json!({"server": {"port": 8080}});
/// assert_eq!(
///     deep_merge(defaults, project),
///     json!({"server": {"host": "127.0.0.1", "port": 8080}})
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold tiers together, lowest priority first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}

//! Field-wise merge policy for multi-frame replies.

use serde_json::Value;

/// Merges `update` into `base`, producing the combined value.
///
/// Objects merge recursively, arrays concatenate in arrival order, and any
/// other pairing is resolved in favor of the newer value. This is the policy
/// that collapses a paged reply (e.g. a key list spread over many frames)
/// into one aggregate result.
pub fn merge(base: Value, update: Value) -> Value {
    match (base, update) {
        (Value::Object(mut base), Value::Object(update)) => {
            for (key, new) in update {
                match base.remove(&key) {
                    Some(old) => {
                        base.insert(key, merge(old, new));
                    }
                    None => {
                        base.insert(key, new);
                    }
                }
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(update)) => {
            base.extend(update);
            Value::Array(base)
        }
        (_, update) => update,
    }
}

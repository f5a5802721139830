//! JSON Merge Patch helpers
//!
//! Application of RFC 7396 patches comes from the `json-patch` crate; the
//! diff direction (current state → desired full state) lives here because
//! the crate only ships the apply direction.

use serde_json::{Map, Value};

/// Compute the RFC 7396 merge patch that turns `base` into `target`.
///
/// Keys present in `base` but absent from `target` become `null` in the
/// patch; arrays and scalars are replaced wholesale.
pub fn diff(base: &Value, target: &Value) -> Value {
    match (base, target) {
        (Value::Object(base_map), Value::Object(target_map)) => {
            let mut patch = Map::new();

            for (key, target_value) in target_map {
                match base_map.get(key) {
                    Some(base_value) if base_value == target_value => {}
                    Some(base_value) => {
                        patch.insert(key.clone(), diff(base_value, target_value));
                    }
                    None => {
                        patch.insert(key.clone(), target_value.clone());
                    }
                }
            }

            for key in base_map.keys() {
                if !target_map.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }

            Value::Object(patch)
        }
        _ => target.clone(),
    }
}

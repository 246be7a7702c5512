//! Structural merge of configuration trees
//!
//! An overlay document may only replace leaves of a base document. Objects
//! merge key by key, arrays and scalars are leaves, and replacing a leaf with
//! a value of a different JSON type is an error.

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Merge `overlay` onto `base`, returning the merged tree
pub fn merge_values(base: &Value, overlay: &Value) -> Result<Value> {
    merge_at(base, overlay, "")
}

fn merge_at(base: &Value, overlay: &Value, path: &str) -> Result<Value> {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                let value = match base_map.get(key) {
                    Some(base_value) => merge_at(base_value, overlay_value, &child_path)?,
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Ok(Value::Object(merged))
        }
        (Value::Null, _) | (_, Value::Null) => Ok(overlay.clone()),
        _ if type_name(base) == type_name(overlay) => Ok(overlay.clone()),
        _ => Err(Error::ConfigTypeMismatch {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
            base: type_name(base).to_string(),
            overlay: type_name(overlay).to_string(),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_leaf_overwrite() {
        let base = json!({
            "train_batch_size": 16,
            "optimizer": {"type": "Adam", "params": {"lr": 0.001, "eps": 1e-8}}
        });
        let overlay = json!({"optimizer": {"params": {"lr": 0.5}}});

        let merged = merge_values(&base, &overlay).unwrap();
        assert_eq!(
            merged,
            json!({
                "train_batch_size": 16,
                "optimizer": {"type": "Adam", "params": {"lr": 0.5, "eps": 1e-8}}
            })
        );
    }

    #[test]
    fn test_new_keys_are_added() {
        let merged = merge_values(&json!({"a": 1}), &json!({"b": {"c": true}})).unwrap();
        assert_eq!(merged, json!({"a": 1, "b": {"c": true}}));
    }

    #[test]
    fn test_arrays_replace_whole() {
        let merged = merge_values(&json!({"betas": [0.9, 0.999]}), &json!({"betas": [0.8]})).unwrap();
        assert_eq!(merged, json!({"betas": [0.8]}));
    }

    #[test]
    fn test_leaf_type_mismatch() {
        let err = merge_values(
            &json!({"optimizer": {"params": {"lr": 0.001}}}),
            &json!({"optimizer": {"params": {"lr": "fast"}}}),
        )
        .unwrap_err();

        match err {
            Error::ConfigTypeMismatch {
                path,
                base,
                overlay,
            } => {
                assert_eq!(path, "optimizer.params.lr");
                assert_eq!(base, "number");
                assert_eq!(overlay, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_object_cannot_replace_leaf() {
        let err = merge_values(&json!({"fp16": true}), &json!({"fp16": {"enabled": true}}))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigTypeMismatch { .. }));

        let err = merge_values(&json!({"fp16": {"enabled": true}}), &json!({"fp16": false}))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigTypeMismatch { .. }));
    }

    #[test]
    fn test_null_is_compatible() {
        let merged = merge_values(&json!({"seed": null}), &json!({"seed": 17})).unwrap();
        assert_eq!(merged, json!({"seed": 17}));
    }
}

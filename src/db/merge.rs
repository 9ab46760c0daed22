//! Shallow field merge for `update`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Serialize a patch into its field map. `null` is an empty patch.
pub fn patch_fields<P: Serialize + ?Sized>(patch: &P) -> Result<Map<String, Value>> {
    match serde_json::to_value(patch)? {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(Map::new()),
        other => Err(Error::Merge(format!(
            "patch must be a JSON object, got {}",
            kind(&other)
        ))),
    }
}

/// Overlay `fields` onto `record`: fields present in the patch win, fields
/// absent from it are kept. Nested objects are replaced, not merged.
pub fn merge_fields<T>(record: &T, fields: &Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(Error::Merge(format!(
                "record must be a JSON object, got {}",
                kind(&other)
            )))
        }
    };

    for (key, value) in fields {
        merged.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| Error::Merge(format!("merged record does not fit the record type: {}", e)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    #[derive(Serialize, Default)]
    struct UserPatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        age: Option<u32>,
    }

    #[test]
    fn test_merge_overrides_and_preserves() {
        let fields = patch_fields(&json!({"b": 3})).unwrap();
        let merged = merge_fields(&json!({"a": 1, "b": 2}), &fields).unwrap();
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn test_merge_adds_new_fields() {
        let fields = patch_fields(&json!({"c": "x"})).unwrap();
        let merged = merge_fields(&json!({"a": 1}), &fields).unwrap();
        assert_eq!(merged, json!({"a": 1, "c": "x"}));
    }

    #[test]
    fn test_merge_is_shallow() {
        let fields = patch_fields(&json!({"nested": {"y": 2}})).unwrap();
        let merged = merge_fields(&json!({"nested": {"x": 1, "y": 1}}), &fields).unwrap();
        assert_eq!(merged, json!({"nested": {"y": 2}}));
    }

    #[test]
    fn test_typed_patch() {
        let user = User { name: "rony".to_string(), age: 30 };
        let fields = patch_fields(&UserPatch { age: Some(31), ..Default::default() }).unwrap();
        let merged = merge_fields(&user, &fields).unwrap();
        assert_eq!(merged, User { name: "rony".to_string(), age: 31 });
    }

    #[test]
    fn test_typed_patch_type_mismatch() {
        let user = User { name: "rony".to_string(), age: 30 };
        let fields = patch_fields(&json!({"age": "old"})).unwrap();
        assert!(matches!(merge_fields(&user, &fields), Err(Error::Merge(_))));
    }

    #[test]
    fn test_non_object_patch_and_record() {
        assert!(matches!(patch_fields(&json!([1, 2])), Err(Error::Merge(_))));
        assert!(patch_fields(&Value::Null).unwrap().is_empty());

        let fields = patch_fields(&json!({"a": 1})).unwrap();
        assert!(matches!(merge_fields(&json!(5), &fields), Err(Error::Merge(_))));
    }
}

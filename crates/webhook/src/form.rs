//! Flat form-encoded bodies with bracket keys (`data[FIELDS][ID]=42`) into a
//! nested JSON tree (spec §4.6 step 1), grounded in the original's
//! `_parse_flat_to_nested`/`_process_nested_key`.

use serde_json::{Map, Value};
use tracing::warn;

fn is_nested_key(key: &str) -> bool {
    key.contains('[') && key.contains(']')
}

fn key_parts(key: &str) -> Vec<String> {
    key.replace(']', "").split('[').map(str::to_string).filter(|p| !p.is_empty()).collect()
}

fn insert_nested(root: &mut Map<String, Value>, parts: &[String], value: Value) {
    let Some((head, rest)) = parts.split_first() else { return };
    if rest.is_empty() {
        root.insert(head.clone(), value);
        return;
    }

    if !matches!(root.get(head), Some(Value::Object(_))) {
        if root.contains_key(head) {
            warn!(key = %head, "webhook form key conflicts with a scalar value, overwriting with an object");
        }
        root.insert(head.clone(), Value::Object(Map::new()));
    }
    if let Some(Value::Object(child)) = root.get_mut(head) {
        insert_nested(child, rest, value);
    }
}

/// Turns a flat `(key, value)` form body into a nested JSON object. Plain
/// keys without brackets are inserted as-is.
pub fn parse_flat_to_nested(fields: &[(String, String)]) -> Value {
    let mut root = Map::new();
    for (key, value) in fields {
        let decoded = key.as_str();
        if is_nested_key(decoded) {
            insert_nested(&mut root, &key_parts(decoded), Value::String(value.clone()));
        } else {
            root.insert(decoded.to_string(), Value::String(value.clone()));
        }
    }
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_bracket_keys() {
        let fields = vec![
            ("event".to_string(), "ONCRMDEALUPDATE".to_string()),
            ("data[FIELDS][ID]".to_string(), "42".to_string()),
            ("auth[domain]".to_string(), "example.bitrix24.ru".to_string()),
        ];
        let tree = parse_flat_to_nested(&fields);
        assert_eq!(tree["event"], "ONCRMDEALUPDATE");
        assert_eq!(tree["data"]["FIELDS"]["ID"], "42");
        assert_eq!(tree["auth"]["domain"], "example.bitrix24.ru");
    }

    #[test]
    fn conflicting_scalar_intermediate_becomes_object() {
        let fields = vec![
            ("data".to_string(), "flat".to_string()),
            ("data[FIELDS][ID]".to_string(), "7".to_string()),
        ];
        let tree = parse_flat_to_nested(&fields);
        assert_eq!(tree["data"]["FIELDS"]["ID"], "7");
    }
}

//! Recursive parameter merging.

use serde_json::Value;

use crate::types::Params;

/// Merge `overlay` into `base`, overlay winning.
///
/// When both sides hold an object at the same key the merge recurses;
/// otherwise the overlay value replaces the base value outright, including
/// when the types differ.
pub fn deep_merge(base: &mut Params, overlay: &Params) {
    for (key, value) in overlay {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (base.get_mut(key), value)
        {
            deep_merge(existing, incoming);
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
}

/// Merge `layers` in increasing precedence into a fresh map.
pub fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a Params>) -> Params {
    let mut merged = Params::new();
    for layer in layers {
        deep_merge(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn nested_objects_merge() {
        let mut base = params(json!({"guard": {"mode": "low", "threshold": 0.5}, "top_p": 0.9}));
        deep_merge(&mut base, &params(json!({"guard": {"mode": "high"}})));
        assert_eq!(
            Value::Object(base),
            json!({"guard": {"mode": "high", "threshold": 0.5}, "top_p": 0.9})
        );
    }

    #[test]
    fn overlay_replaces_on_type_change() {
        let mut base = params(json!({"stop": {"a": 1}, "temperature": 0.5}));
        deep_merge(&mut base, &params(json!({"stop": ["END"], "temperature": "hot"})));
        assert_eq!(base["stop"], json!(["END"]));
        assert_eq!(base["temperature"], json!("hot"));
    }

    #[test]
    fn later_layers_take_precedence() {
        let family = params(json!({"temperature": 0.7, "max_tokens": 4096}));
        let use_case = params(json!({"temperature": 0.2}));
        let custom = params(json!({"max_tokens": 100}));
        let merged = merge_layers([&family, &use_case, &custom]);
        assert_eq!(merged["temperature"], json!(0.2));
        assert_eq!(merged["max_tokens"], json!(100));
    }
}

//! Canonical document: the identity→value snapshot exchanged as patches.
//!
//! Encoding is JSON with keys in sorted order, so two documents built from
//! identical field values always serialize to identical text. The patch layer
//! diffs these texts and relies on that stability.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::field::{FieldId, FieldValue};
use crate::registry::FieldRegistry;

/// Ordered snapshot of every registered field, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalDocument {
    entries: Vec<(FieldId, FieldValue)>,
}

impl CanonicalDocument {
    /// Re-read every live field. Never partial: one entry per registered field.
    pub fn build(registry: &FieldRegistry) -> Self {
        let entries = registry
            .values()
            .map(|(id, value)| (id.clone(), value))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &FieldId) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deterministic encoding: a JSON object with sorted keys.
    pub fn serialize(&self) -> FormResult<String> {
        let sorted: BTreeMap<&str, &FieldValue> =
            self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        serde_json::to_string(&sorted).map_err(|e| FormError::Serialization(e.to_string()))
    }
}

/// An authoritative document received from the transport.
#[derive(Debug, Clone, Default)]
pub struct RemoteDocument {
    values: HashMap<FieldId, FieldValue>,
}

impl RemoteDocument {
    /// Parse authoritative document text.
    ///
    /// Bools and strings map directly; numbers are read as text; `null`,
    /// arrays and nested objects are treated as absent keys.
    pub fn parse(text: &str) -> FormResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(FormError::NotAnObject);
        };

        let values = map
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Bool(b) => FieldValue::Toggle(b),
                    Value::String(s) => FieldValue::Text(s),
                    Value::Number(n) => FieldValue::Text(n.to_string()),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((FieldId::new(key), value))
            })
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, id: &FieldId) -> Option<&FieldValue> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Whether `text` is a well-formed canonical document: a JSON object whose
/// values are all bools or strings.
///
/// Transports use this to reject merged results that would break the form.
pub fn validate(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map
            .values()
            .all(|v| matches!(v, Value::Bool(_) | Value::String(_))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::MemoryField;

    fn registry() -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        registry
            .register_with_id(FieldId::new("zeta"), MemoryField::text_input("z", "last").boxed())
            .unwrap();
        registry
            .register_with_id(FieldId::new("alpha"), MemoryField::checkbox("a", true).boxed())
            .unwrap();
        registry
    }

    #[test]
    fn test_build_keeps_registration_order() {
        let doc = CanonicalDocument::build(&registry());
        let keys: Vec<_> = doc.iter().map(|(k, _)| k.as_str().to_string()).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(doc.get(&FieldId::new("alpha")), Some(&FieldValue::Toggle(true)));
    }

    #[test]
    fn test_build_has_one_entry_per_field() {
        let mut registry = registry();
        registry.register(MemoryField::textarea("empty", "").boxed());
        registry.register(MemoryField::checkbox("off", false).boxed());

        let doc = CanonicalDocument::build(&registry);
        assert_eq!(doc.len(), registry.len());
        for id in registry.ids() {
            assert!(doc.get(&id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn test_serialize_sorts_keys() {
        let doc = CanonicalDocument::build(&registry());
        assert_eq!(doc.serialize().unwrap(), r#"{"alpha":true,"zeta":"last"}"#);
    }

    #[test]
    fn test_consecutive_builds_serialize_identically() {
        let registry = registry();
        let first = CanonicalDocument::build(&registry).serialize().unwrap();
        let second = CanonicalDocument::build(&registry).serialize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_registry_serializes_to_empty_object() {
        let doc = CanonicalDocument::build(&FieldRegistry::new());
        assert!(doc.is_empty());
        assert_eq!(doc.serialize().unwrap(), "{}");
    }

    #[test]
    fn test_parse_remote() {
        let remote =
            RemoteDocument::parse(r#"{"a":true,"b":"x","c":3,"d":null,"e":[1]}"#).unwrap();
        assert_eq!(remote.get(&FieldId::new("a")), Some(&FieldValue::Toggle(true)));
        assert_eq!(remote.get(&FieldId::new("b")), Some(&FieldValue::Text("x".into())));
        assert_eq!(remote.get(&FieldId::new("c")), Some(&FieldValue::Text("3".into())));
        assert!(remote.get(&FieldId::new("d")).is_none());
        assert!(remote.get(&FieldId::new("e")).is_none());
        assert_eq!(remote.len(), 3);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(RemoteDocument::parse("[1,2]"), Err(FormError::NotAnObject)));
        assert!(matches!(
            RemoteDocument::parse("{\"a\":"),
            Err(FormError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(validate("{}"));
        assert!(validate(r#"{"a":true,"b":"x"}"#));
        assert!(!validate(r#"{"a":1}"#));
        assert!(!validate(r#"{"a":"x""#));
        assert!(!validate("\"just a string\""));
    }
}

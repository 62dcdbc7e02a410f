//! Field registry: the single owner of every tracked field.
//!
//! Fields are enumerated once at startup. Each one gets a [`FieldId`], a
//! [`FieldDescriptor`] classifying its editing semantics, and a cached value
//! holding the last value the engine observed or wrote. Iteration is always
//! in registration order.

use std::collections::HashMap;

use crate::error::{FormError, FormResult};
use crate::field::{
    canonical_offset, canonicalize, FieldBinding, FieldDescriptor, FieldId, FieldKind, FieldValue, SelectionRange,
};

struct FieldEntry {
    descriptor: FieldDescriptor,
    binding: Box<dyn FieldBinding>,
    cached: FieldValue,
}

impl FieldEntry {
    fn read(&self) -> FieldValue {
        match self.descriptor.kind {
            FieldKind::Toggle => FieldValue::Toggle(self.binding.checked()),
            FieldKind::Text => FieldValue::Text(canonicalize(&self.binding.text())),
        }
    }

    fn write(&mut self, value: &FieldValue) {
        match (self.descriptor.kind, value.coerce(self.descriptor.kind)) {
            (FieldKind::Toggle, FieldValue::Toggle(checked)) => self.binding.set_checked(checked),
            (FieldKind::Text, FieldValue::Text(text)) => self.binding.set_text(&text),
            // coerce() always yields the variant matching the kind
            _ => {}
        }
    }
}

/// Registry of tracked fields, keyed by [`FieldId`].
#[derive(Default)]
pub struct FieldRegistry {
    entries: Vec<FieldEntry>,
    index: HashMap<FieldId, usize>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate candidate fields once. Ids follow enumeration order.
    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FieldBinding>>,
    {
        let mut registry = Self::new();
        for binding in bindings {
            registry.register(binding);
        }
        registry
    }

    /// Register a field under the next sequential identity. An index already
    /// taken by a caller-chosen id is skipped.
    pub fn register(&mut self, binding: Box<dyn FieldBinding>) -> FieldId {
        let mut index = self.entries.len();
        let mut id = FieldId::sequential(index);
        while self.index.contains_key(&id) {
            index += 1;
            id = FieldId::sequential(index);
        }
        self.insert(id.clone(), binding);
        id
    }

    /// Register a field under a caller-chosen identity.
    pub fn register_with_id(
        &mut self,
        id: FieldId,
        binding: Box<dyn FieldBinding>,
    ) -> FormResult<FieldId> {
        if self.index.contains_key(&id) {
            return Err(FormError::DuplicateField(id));
        }
        self.insert(id.clone(), binding);
        Ok(id)
    }

    fn insert(&mut self, id: FieldId, binding: Box<dyn FieldBinding>) {
        let input_type = binding.input_type();
        let descriptor = FieldDescriptor {
            id: id.clone(),
            kind: input_type.kind(),
            preserve_cursor: input_type.preserves_cursor(),
            name: binding.name(),
            input_type,
        };
        let mut entry = FieldEntry {
            descriptor,
            binding,
            cached: FieldValue::Toggle(false),
        };
        entry.cached = entry.read();

        log::debug!(
            "registered field {} ({:?}, type={}, name={:?})",
            id,
            entry.descriptor.kind,
            entry.descriptor.input_type.as_str(),
            entry.descriptor.name
        );

        self.index.insert(id, self.entries.len());
        self.entries.push(entry);
    }

    fn entry(&self, id: &FieldId) -> FormResult<&FieldEntry> {
        self.index
            .get(id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| FormError::UnknownField(id.clone()))
    }

    fn entry_mut(&mut self, id: &FieldId) -> FormResult<&mut FieldEntry> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(FormError::UnknownField(id.clone())),
        }
    }

    pub fn get(&self, id: &FieldId) -> Option<&FieldDescriptor> {
        self.entry(id).ok().map(|e| &e.descriptor)
    }

    /// Visit every descriptor in registration order.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&FieldDescriptor),
    {
        for entry in &self.entries {
            f(&entry.descriptor);
        }
    }

    /// Every field's live value, in registration order.
    pub fn values(&self) -> impl Iterator<Item = (&FieldId, FieldValue)> + '_ {
        self.entries.iter().map(|e| (&e.descriptor.id, e.read()))
    }

    /// Identities in registration order.
    pub fn ids(&self) -> Vec<FieldId> {
        self.entries.iter().map(|e| e.descriptor.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live value of a field, read through its binding.
    pub fn value(&self, id: &FieldId) -> FormResult<FieldValue> {
        Ok(self.entry(id)?.read())
    }

    /// Write a value into the live field, coercing it to the field's kind.
    pub fn set_value(&mut self, id: &FieldId, value: &FieldValue) -> FormResult<()> {
        self.entry_mut(id)?.write(value);
        Ok(())
    }

    /// Last value the engine observed or wrote for this field.
    pub fn cached(&self, id: &FieldId) -> Option<&FieldValue> {
        self.entry(id).ok().map(|e| &e.cached)
    }

    pub fn set_cached(&mut self, id: &FieldId, value: FieldValue) -> FormResult<()> {
        let entry = self.entry_mut(id)?;
        entry.cached = value.coerce(entry.descriptor.kind);
        Ok(())
    }

    /// Re-read every live value into the cache.
    pub fn refresh_cache(&mut self) {
        for entry in &mut self.entries {
            entry.cached = entry.read();
        }
    }

    /// Current selection in line-feed coordinates, the same space as
    /// [`value`](Self::value): a `\r\n` before an offset counts once.
    pub fn selection(&self, id: &FieldId) -> FormResult<Option<SelectionRange>> {
        let binding = &self.entry(id)?.binding;
        let Some(sel) = binding.selection() else {
            return Ok(None);
        };
        let raw = binding.text();
        Ok(Some(SelectionRange {
            start: canonical_offset(&raw, sel.start),
            end: canonical_offset(&raw, sel.end),
        }))
    }

    pub fn set_selection(&mut self, id: &FieldId, selection: SelectionRange) -> FormResult<()> {
        self.entry_mut(id)?.binding.set_selection(selection);
        Ok(())
    }

    /// Enable or disable input on every field.
    pub fn set_enabled(&mut self, enabled: bool) {
        for entry in &mut self.entries {
            entry.binding.set_enabled(enabled);
        }
    }

    pub fn is_enabled(&self, id: &FieldId) -> FormResult<bool> {
        Ok(self.entry(id)?.binding.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{InputType, MemoryField};

    fn sample() -> (FieldRegistry, MemoryField, MemoryField) {
        let check = MemoryField::checkbox("agree", false);
        let text = MemoryField::textarea("notes", "line1\r\nline2");
        let mut registry = FieldRegistry::new();
        registry
            .register_with_id(FieldId::new("a"), check.boxed())
            .unwrap();
        registry
            .register_with_id(FieldId::new("b"), text.boxed())
            .unwrap();
        (registry, check, text)
    }

    #[test]
    fn test_registration_classifies_fields() {
        let (registry, _, _) = sample();
        let a = registry.get(&FieldId::new("a")).unwrap();
        assert_eq!(a.kind, FieldKind::Toggle);
        assert!(!a.preserve_cursor);
        assert_eq!(a.name, "agree");

        let b = registry.get(&FieldId::new("b")).unwrap();
        assert_eq!(b.kind, FieldKind::Text);
        assert!(b.preserve_cursor);
    }

    #[test]
    fn test_non_text_editable_does_not_preserve_cursor() {
        let mut registry = FieldRegistry::new();
        let id = registry.register(MemoryField::new(InputType::Number, "qty").with_text("3").boxed());
        let d = registry.get(&id).unwrap();
        assert_eq!(d.kind, FieldKind::Text);
        assert!(!d.preserve_cursor);
    }

    #[test]
    fn test_each_follows_registration_order() {
        let (registry, _, _) = sample();
        let mut seen = Vec::new();
        registry.each(|d| seen.push(d.id.as_str().to_string()));
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(registry.ids(), vec![FieldId::new("a"), FieldId::new("b")]);
    }

    #[test]
    fn test_text_values_are_canonicalized() {
        let (registry, _, _) = sample();
        assert_eq!(
            registry.value(&FieldId::new("b")).unwrap(),
            FieldValue::Text("line1\nline2".into())
        );
        assert_eq!(
            registry.cached(&FieldId::new("b")),
            Some(&FieldValue::Text("line1\nline2".into()))
        );
    }

    #[test]
    fn test_set_value_dispatches_on_kind() {
        let (mut registry, check, text) = sample();
        registry
            .set_value(&FieldId::new("a"), &FieldValue::Toggle(true))
            .unwrap();
        assert!(check.checked());

        registry
            .set_value(&FieldId::new("b"), &FieldValue::Text("x\r\ny".into()))
            .unwrap();
        assert_eq!(text.text(), "x\ny");
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let (mut registry, _, _) = sample();
        let err = registry
            .register_with_id(FieldId::new("a"), MemoryField::checkbox("dup", true).boxed())
            .unwrap_err();
        assert!(matches!(err, FormError::DuplicateField(_)));

        let err = registry.value(&FieldId::new("zzz")).unwrap_err();
        assert!(matches!(err, FormError::UnknownField(_)));
        assert!(registry.get(&FieldId::new("zzz")).is_none());
    }

    #[test]
    fn test_set_enabled_reaches_every_field() {
        let (mut registry, check, text) = sample();
        registry.set_enabled(false);
        assert!(!check.is_enabled());
        assert!(!text.is_enabled());
        assert!(!registry.is_enabled(&FieldId::new("a")).unwrap());
    }

    #[test]
    fn test_from_bindings_ids_follow_enumeration_order() {
        let form = || {
            FieldRegistry::from_bindings(vec![
                MemoryField::checkbox("x", true).boxed(),
                MemoryField::text_input("y", "hi").boxed(),
            ])
        };
        let ids = form().ids();
        assert_eq!(ids, vec![FieldId::new("rtform-0"), FieldId::new("rtform-1")]);
        // A second client enumerating the same form agrees on every id.
        assert_eq!(form().ids(), ids);
    }

    #[test]
    fn test_register_skips_taken_sequential_id() {
        let mut registry = FieldRegistry::new();
        registry
            .register_with_id(FieldId::new("rtform-1"), MemoryField::checkbox("a", false).boxed())
            .unwrap();
        let id = registry.register(MemoryField::checkbox("b", false).boxed());
        assert_eq!(id, FieldId::new("rtform-2"));
    }
}

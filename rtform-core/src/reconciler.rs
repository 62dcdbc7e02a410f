//! Remote reconciler: merges an authoritative document into live fields.
//!
//! For each registered field, in registration order:
//!
//! 1. Skip if the remote value equals the live value, so an unchanged
//!    document causes no writes and no selection churn.
//! 2. For cursor-preserving fields, diff old → new, push the selection
//!    through the edit, write the value, and restore the *transformed*
//!    selection. A collaborator typing upstream of the caret therefore moves
//!    the caret along with the text it sits in.
//! 3. Otherwise write the value directly.
//! 4. Update the registry cache.
//!
//! A field whose key is missing from the remote document is left untouched.

use crate::document::RemoteDocument;
use crate::error::FormResult;
use crate::field::{FieldId, FieldValue, SelectionRange};
use crate::diff::{DiffEngine, PrefixSuffixDiff};
use crate::registry::FieldRegistry;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Fields whose live value was overwritten.
    pub updated: Vec<FieldId>,
    /// Fields already equal to the remote value.
    pub unchanged: Vec<FieldId>,
    /// Fields with no key in the remote document.
    pub missing: Vec<FieldId>,
}

impl ReconcileReport {
    /// Number of field writes performed.
    pub fn mutations(&self) -> usize {
        self.updated.len()
    }
}

pub struct Reconciler<D = PrefixSuffixDiff> {
    diff: D,
}

impl Default for Reconciler<PrefixSuffixDiff> {
    fn default() -> Self {
        Self::new(PrefixSuffixDiff)
    }
}

impl<D: DiffEngine> Reconciler<D> {
    pub fn new(diff: D) -> Self {
        Self { diff }
    }

    pub fn diff_engine(&self) -> &D {
        &self.diff
    }

    /// Parse `text` and run one pass. Parsing happens before any field is
    /// touched, so a malformed document leaves the form unchanged.
    pub fn reconcile(&self, registry: &mut FieldRegistry, text: &str) -> FormResult<ReconcileReport> {
        let remote = RemoteDocument::parse(text)?;
        self.reconcile_document(registry, &remote)
    }

    pub fn reconcile_document(
        &self,
        registry: &mut FieldRegistry,
        remote: &RemoteDocument,
    ) -> FormResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for id in registry.ids() {
            let Some(descriptor) = registry.get(&id) else {
                continue;
            };
            let kind = descriptor.kind;
            let preserve_cursor = descriptor.preserve_cursor;

            let Some(incoming) = remote.get(&id) else {
                log::debug!("remote document has no key for {id}, leaving it alone");
                report.missing.push(id);
                continue;
            };
            let new_value = incoming.coerce(kind);
            let old_value = registry.value(&id)?;

            if new_value == old_value {
                registry.set_cached(&id, new_value)?;
                report.unchanged.push(id);
                continue;
            }

            match (&old_value, &new_value, preserve_cursor) {
                (FieldValue::Text(old), FieldValue::Text(new), true) => {
                    let selection = registry.selection(&id)?;
                    let restored = selection.map(|sel| self.transform_selection(old, new, sel));
                    registry.set_value(&id, &new_value)?;
                    if let Some(sel) = restored {
                        registry.set_selection(&id, sel)?;
                    }
                }
                _ => registry.set_value(&id, &new_value)?,
            }

            registry.set_cached(&id, new_value)?;
            report.updated.push(id);
        }

        Ok(report)
    }

    fn transform_selection(&self, old: &str, new: &str, selection: SelectionRange) -> SelectionRange {
        let op = self.diff.diff(old, new);
        let len = new.chars().count();
        SelectionRange {
            start: self.diff.transform_cursor(selection.start, &op).min(len),
            end: self.diff.transform_cursor(selection.end, &op).min(len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldBinding, MemoryField};

    fn form() -> (FieldRegistry, MemoryField, MemoryField) {
        let toggle = MemoryField::checkbox("agree", false);
        let text = MemoryField::text_input("greeting", "hello");
        text.select(SelectionRange::caret(5));

        let mut registry = FieldRegistry::new();
        registry
            .register_with_id(FieldId::new("toggle"), toggle.boxed())
            .unwrap();
        registry
            .register_with_id(FieldId::new("text"), text.boxed())
            .unwrap();
        (registry, toggle, text)
    }

    #[test]
    fn test_merge_preserves_cursor_meaning() {
        let (mut registry, toggle, text) = form();
        let report = Reconciler::default()
            .reconcile(&mut registry, r#"{"toggle":true,"text":"help"}"#)
            .unwrap();

        assert!(toggle.checked());
        assert_eq!(text.text(), "help");
        assert_eq!(text.selection(), Some(SelectionRange::caret(4)));
        assert_eq!(report.mutations(), 2);
        assert_eq!(registry.cached(&FieldId::new("text")), Some(&FieldValue::Text("help".into())));
    }

    #[test]
    fn test_upstream_insert_shifts_cursor() {
        let text = MemoryField::text_input("t", "abcdef");
        text.select(SelectionRange::new(5, 5));
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("t"), text.boxed()).unwrap();

        Reconciler::default()
            .reconcile(&mut registry, r#"{"t":"abXcdef"}"#)
            .unwrap();
        assert_eq!(text.selection(), Some(SelectionRange::caret(6)));
    }

    #[test]
    fn test_selection_range_is_transformed_on_both_ends() {
        let text = MemoryField::textarea("t", "the quick fox");
        text.select(SelectionRange::new(4, 9));
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("t"), text.boxed()).unwrap();

        Reconciler::default()
            .reconcile(&mut registry, r#"{"t":"see the quick fox"}"#)
            .unwrap();
        assert_eq!(text.selection(), Some(SelectionRange::new(8, 13)));
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let (mut registry, toggle, text) = form();
        let reconciler = Reconciler::default();
        let doc = r#"{"toggle":true,"text":"help"}"#;

        reconciler.reconcile(&mut registry, doc).unwrap();
        let writes = (toggle.value_writes(), text.value_writes(), text.selection_writes());

        let report = reconciler.reconcile(&mut registry, doc).unwrap();
        assert_eq!(report.mutations(), 0);
        assert_eq!(report.unchanged.len(), 2);
        assert_eq!(
            (toggle.value_writes(), text.value_writes(), text.selection_writes()),
            writes
        );
    }

    #[test]
    fn test_toggle_never_gets_selection_restored() {
        let (mut registry, toggle, _) = form();
        toggle.select(SelectionRange::new(1, 3));

        Reconciler::default()
            .reconcile(&mut registry, r#"{"toggle":true,"text":"hello"}"#)
            .unwrap();
        assert!(toggle.checked());
        assert_eq!(toggle.selection_writes(), 0);
    }

    #[test]
    fn test_missing_key_leaves_field_untouched() {
        let (mut registry, toggle, text) = form();
        let report = Reconciler::default()
            .reconcile(&mut registry, r#"{"toggle":true}"#)
            .unwrap();

        assert_eq!(report.missing, vec![FieldId::new("text")]);
        assert_eq!(text.text(), "hello");
        assert_eq!(text.value_writes(), 0);
        assert_eq!(text.selection(), Some(SelectionRange::caret(5)));
        assert!(toggle.checked());
    }

    #[test]
    fn test_crlf_compares_equal() {
        let text = MemoryField::textarea("t", "a\r\nb");
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("t"), text.boxed()).unwrap();

        let report = Reconciler::default()
            .reconcile(&mut registry, r#"{"t":"a\nb"}"#)
            .unwrap();
        assert_eq!(report.mutations(), 0);
        assert_eq!(text.value_writes(), 0);
    }

    #[test]
    fn test_caret_after_crlf_is_mapped_before_transform() {
        // Caret between "b" and "c"; the raw text carries a CRLF upstream.
        let text = MemoryField::textarea("t", "a\r\nbc");
        text.select(SelectionRange::caret(4));
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("t"), text.boxed()).unwrap();

        Reconciler::default()
            .reconcile(&mut registry, r#"{"t":"Za\nbc"}"#)
            .unwrap();
        assert_eq!(text.text(), "Za\nbc");
        assert_eq!(text.selection(), Some(SelectionRange::caret(4)));
    }

    #[test]
    fn test_malformed_document_touches_nothing() {
        let (mut registry, toggle, text) = form();
        assert!(Reconciler::default().reconcile(&mut registry, "not json").is_err());
        assert_eq!(toggle.value_writes(), 0);
        assert_eq!(text.value_writes(), 0);
    }

    #[test]
    fn test_non_cursor_text_written_directly() {
        let qty = MemoryField::new(crate::field::InputType::Number, "qty").with_text("1");
        qty.select(SelectionRange::caret(1));
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("q"), qty.boxed()).unwrap();

        Reconciler::default()
            .reconcile(&mut registry, r#"{"q":"12"}"#)
            .unwrap();
        assert_eq!(qty.text(), "12");
        assert_eq!(qty.selection_writes(), 0);
    }
}

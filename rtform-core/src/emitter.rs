//! Local change emitter: turns field edits into outgoing patches.
//!
//! The emitter does no diffing. On every accepted notification it rebuilds
//! the canonical document and hands the serialized text to a [`PatchSink`];
//! computing the actual delta is the sink's job.

use crate::document::CanonicalDocument;
use crate::error::FormResult;
use crate::field::{FieldEvent, FieldId};
use crate::gate::EditGate;
use crate::registry::FieldRegistry;

/// Outgoing-patch capability. Called synchronously with the full new snapshot.
pub trait PatchSink {
    fn emit_patch(&mut self, serialized: &str) -> FormResult<()>;
}

/// Recording sink.
impl PatchSink for Vec<String> {
    fn emit_patch(&mut self, serialized: &str) -> FormResult<()> {
        self.push(serialized.to_string());
        Ok(())
    }
}

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// A snapshot was handed to the sink.
    Emitted,
    /// Dropped because the gate is closed.
    Suppressed,
    /// The field does not listen to this event, or is unknown.
    Ignored,
}

#[derive(Debug, Default)]
pub struct LocalChangeEmitter {
    emitted: u64,
    suppressed: u64,
}

impl LocalChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a field-level event. Only events the field's input type listens
    /// to count as a change.
    pub fn on_field_event(
        &mut self,
        registry: &mut FieldRegistry,
        gate: EditGate,
        id: &FieldId,
        event: FieldEvent,
        sink: &mut dyn PatchSink,
    ) -> FormResult<EmitOutcome> {
        let listens = registry
            .get(id)
            .is_some_and(|d| d.input_type.listens_to(event));
        if !listens {
            log::trace!("ignoring {event:?} on {id}");
            return Ok(EmitOutcome::Ignored);
        }
        self.on_local(registry, gate, sink)
    }

    /// A field changed somewhere: snapshot everything and emit.
    pub fn on_local(
        &mut self,
        registry: &mut FieldRegistry,
        gate: EditGate,
        sink: &mut dyn PatchSink,
    ) -> FormResult<EmitOutcome> {
        if !gate.is_open() {
            self.suppressed += 1;
            return Ok(EmitOutcome::Suppressed);
        }

        let serialized = CanonicalDocument::build(registry).serialize()?;
        registry.refresh_cache();
        sink.emit_patch(&serialized)?;
        self.emitted += 1;
        Ok(EmitOutcome::Emitted)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

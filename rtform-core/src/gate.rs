//! Editability gate: input stays disabled until the first reconciliation.

use crate::registry::FieldRegistry;

/// Two-state, one-way switch. `Closed` until the readiness pass completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditGate {
    #[default]
    Closed,
    Open,
}

impl EditGate {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Disable every field. Called once, before the transport starts.
    pub fn close_fields(&self, registry: &mut FieldRegistry) {
        registry.set_enabled(self.is_open());
    }

    /// Open the gate and enable every field. Returns `false` if it was
    /// already open; there is no way back to `Closed`.
    pub fn open(&mut self, registry: &mut FieldRegistry) -> bool {
        if self.is_open() {
            return false;
        }
        *self = Self::Open;
        registry.set_enabled(true);
        true
    }
}

//! # rtform-core: Collaborative form reconciliation engine
//!
//! Keeps a set of editable fields on one client in sync with the copies other
//! clients hold, by exchanging whole-form snapshots through a transport that
//! turns them into patches.
//!
//! ## Flow
//!
//! ```text
//! share token ──► SessionIdentity
//!                      │
//! field bindings ──► FieldRegistry ──► CanonicalDocument ──► SessionConfig
//!                      │                                          │
//!                      │                                    (transport)
//!                      │                                          │
//!   on_local ──► LocalChangeEmitter ──► PatchSink ────────────────┤
//!                      │                                          │
//!   on_ready / on_remote ◄── Reconciler ◄── authoritative text ◄──┘
//!                      │
//!                 EditGate (closed until the first on_ready pass)
//! ```
//!
//! ## Modules
//!
//! - [`field`]: identities, input types, values, the binding contract
//! - [`registry`]: the field registry
//! - [`document`]: canonical snapshot, remote parsing, validation
//! - [`diff`]: edit operations and cursor transforms
//! - [`emitter`]: local change emitter and the patch sink seam
//! - [`reconciler`]: remote reconciliation with cursor preservation
//! - [`gate`]: editability gate
//! - [`session`]: share-token bootstrap
//! - [`lifecycle`]: transport contract
//! - [`form`]: `FormSession`, the coordinator

pub mod diff;
pub mod document;
pub mod emitter;
pub mod error;
pub mod field;
pub mod form;
pub mod gate;
pub mod lifecycle;
pub mod reconciler;
pub mod registry;
pub mod session;

pub use diff::{DiffEngine, EditOperation, PrefixSuffixDiff};
pub use document::{validate, CanonicalDocument, RemoteDocument};
pub use emitter::{EmitOutcome, LocalChangeEmitter, PatchSink};
pub use error::{FormError, FormResult};
pub use field::{
    FieldBinding, FieldDescriptor, FieldEvent, FieldId, FieldKind, FieldValue, InputType,
    MemoryField, SelectionRange,
};
pub use form::{FormSession, ABORT_NOTICE};
pub use gate::EditGate;
pub use lifecycle::{AbortInfo, InitInfo, Lifecycle, RemoteInfo, SessionConfig, TransformFn};
pub use reconciler::{ReconcileReport, Reconciler};
pub use registry::FieldRegistry;
pub use session::{KeyGenerator, RandomKeys, SessionIdentity, CHANNEL_ID_LEN};

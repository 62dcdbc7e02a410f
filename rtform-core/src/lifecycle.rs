//! Transport contract: the configuration bundle a transport is started with
//! and the lifecycle callbacks it drives.
//!
//! The transport owns ordering: callbacks are delivered one at a time and
//! never overlap. Implementors take `&mut self` on every callback, so a
//! reconciliation pass always finishes before the next notification runs.

use crate::document;
use crate::emitter::PatchSink;
use crate::error::FormResult;

/// Validates a merged document text before a transport accepts it.
pub type TransformFn = fn(&str) -> bool;

/// Configuration bundle handed to the transport.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serialized canonical document seeding a new channel.
    pub initial_state: String,
    pub websocket_url: String,
    pub user_name: String,
    /// Empty when the transport should allocate a channel.
    pub channel: String,
    pub crypt_key: String,
    pub transform: TransformFn,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_state: "{}".to_string(),
            websocket_url: "ws://localhost:3000/websocket".to_string(),
            user_name: String::new(),
            channel: String::new(),
            crypt_key: String::new(),
            transform: document::validate,
        }
    }
}

/// Delivered once the transport has a channel.
#[derive(Debug, Clone, Copy)]
pub struct InitInfo<'a> {
    pub channel: &'a str,
}

/// Delivered on readiness and on each remote update.
#[derive(Debug, Clone, Copy)]
pub struct RemoteInfo<'a> {
    /// Latest authoritative document text as the transport sees it.
    pub user_document: &'a str,
}

/// Delivered when the transport gives up on the session.
#[derive(Debug, Clone, Copy)]
pub struct AbortInfo<'a> {
    pub reason: &'a str,
}

/// Callbacks a transport drives.
pub trait Lifecycle {
    fn on_init(&mut self, info: &InitInfo<'_>);

    /// A local field changed; `sink` receives the outgoing snapshot.
    fn on_local(&mut self, sink: &mut dyn PatchSink) -> FormResult<()>;

    fn on_remote(&mut self, info: &RemoteInfo<'_>) -> FormResult<()>;

    /// Initial history has been replayed; the document is authoritative.
    fn on_ready(&mut self, info: &RemoteInfo<'_>) -> FormResult<()>;

    fn on_abort(&mut self, info: &AbortInfo<'_>);
}

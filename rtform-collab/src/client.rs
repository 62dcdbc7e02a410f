//! Realtime client: connects a [`Lifecycle`] implementation to the relay.
//!
//! The client owns the transport side of the contract. It joins a channel,
//! fires `on_init` and `on_ready`, turns snapshots handed to
//! [`PatchSink::emit_patch`] into operations, and dispatches relay messages to
//! `on_remote`/`on_abort` strictly one at a time. Session callbacks run
//! synchronously between awaits, never concurrently.

use std::sync::Arc;

use rtform_core::{
    AbortInfo, DiffEngine, FieldEvent, FieldId, FormError, FormResult, FormSession, InitInfo,
    Lifecycle, PatchSink, RemoteInfo, SessionConfig,
};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::error::{RelayError, RelayResult};
use crate::patcher::TextPatcher;
use crate::protocol::{PatchRequest, PeerInfo, RelayMessage};
use crate::relay::Relay;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Aborted,
}

pub struct RealtimeClient {
    relay: Relay,
    peer: PeerInfo,
    config: SessionConfig,
    channel: String,
    patcher: TextPatcher,
    receiver: Option<broadcast::Receiver<Arc<Vec<u8>>>>,
    state: ConnectionState,
}

impl RealtimeClient {
    pub fn new(relay: Relay, config: SessionConfig) -> Self {
        let patcher = TextPatcher::new(config.initial_state.clone(), 0, config.transform);
        Self {
            peer: PeerInfo::new(config.user_name.clone()),
            channel: config.channel.clone(),
            relay,
            config,
            patcher,
            receiver: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Join the configured channel and bring `session` to readiness.
    ///
    /// Fires `on_init` with the assigned channel, then `on_ready` with the
    /// authoritative document. A refused join fires `on_abort`.
    pub async fn connect<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<()> {
        let joined = match self
            .relay
            .join(self.peer.clone(), &self.config.channel, &self.config.initial_state)
            .await
        {
            Ok(joined) => joined,
            Err(e) => {
                self.abort(session, &e.to_string());
                return Err(e);
            }
        };

        self.channel = joined.channel;
        self.patcher = TextPatcher::new(joined.document, joined.version, self.config.transform);
        self.receiver = Some(joined.receiver);
        self.state = ConnectionState::Connected;
        log::info!(
            "{} joined {} at v{}",
            self.peer.name,
            self.channel,
            self.patcher.version()
        );

        session.on_init(&InitInfo { channel: &self.channel });
        session.on_ready(&RemoteInfo {
            user_document: self.patcher.user_document(),
        })?;
        Ok(())
    }

    /// A local field changed: let the session emit, then submit.
    pub async fn local_change<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<()> {
        session.on_local(self)?;
        self.flush().await
    }

    /// Route a UI event on one field, then submit whatever it produced.
    pub async fn field_event<D: DiffEngine>(
        &mut self,
        session: &mut FormSession<D>,
        id: &FieldId,
        event: FieldEvent,
    ) -> RelayResult<()> {
        session.field_event(id, event, self)?;
        self.flush().await
    }

    /// Submit the pending local change, if any and if nothing is in flight.
    pub async fn flush(&mut self) -> RelayResult<()> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        let Some((base_version, op)) = self.patcher.take_pending() else {
            return Ok(());
        };
        let request = PatchRequest {
            peer_id: self.peer.peer_id,
            base_version,
            op,
        };
        if let Err(e) = self.relay.submit(&self.channel, request).await {
            // The relay no longer knows us; resync on the next message.
            log::warn!("patch submission failed: {e}");
            let (document, version) = self
                .relay
                .document(&self.channel)
                .await
                .ok_or_else(|| RelayError::UnknownChannel(self.channel.clone()))?;
            self.patcher.reset(&document, version);
            return Err(e);
        }
        Ok(())
    }

    /// Await and handle one relay message. Returns `false` once the session
    /// has ended.
    pub async fn next_event<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<bool> {
        let received = match self.receiver.as_mut() {
            Some(rx) => rx.recv().await,
            None => return Ok(false),
        };
        let keep_going = match received {
            Ok(bytes) => self.handle(&bytes, session)?,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("lagged by {skipped} messages, resynchronizing");
                self.resync(session).await?;
                true
            }
            Err(RecvError::Closed) => {
                self.abort(session, "relay closed the channel");
                false
            }
        };
        if keep_going {
            self.flush().await?;
        }
        Ok(keep_going)
    }

    /// Handle every message already delivered, without waiting. Returns the
    /// number handled.
    pub async fn pump<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<usize> {
        let mut handled = 0;
        loop {
            let received = match self.receiver.as_mut() {
                Some(rx) => rx.try_recv(),
                None => return Ok(handled),
            };
            match received {
                Ok(bytes) => {
                    handled += 1;
                    if !self.handle(&bytes, session)? {
                        return Ok(handled);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("lagged by {skipped} messages, resynchronizing");
                    self.resync(session).await?;
                }
                Err(TryRecvError::Closed) => {
                    self.abort(session, "relay closed the channel");
                    return Ok(handled);
                }
            }
        }
        self.flush().await?;
        Ok(handled)
    }

    /// Drive the session until the relay aborts it.
    pub async fn run<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<()> {
        while self.next_event(session).await? {}
        Ok(())
    }

    /// Leave the channel.
    pub async fn disconnect(&mut self) -> RelayResult<()> {
        if self.state == ConnectionState::Connected {
            self.relay.leave(&self.channel, self.peer.peer_id).await?;
        }
        self.receiver = None;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn handle<L: Lifecycle>(&mut self, bytes: &[u8], session: &mut L) -> RelayResult<bool> {
        let msg = match RelayMessage::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("dropping undecodable relay message: {e}");
                return Ok(true);
            }
        };

        match msg {
            RelayMessage::Update {
                author,
                version,
                document,
                ..
            } => {
                let changed = if author == self.peer.peer_id {
                    self.patcher.acknowledge(&document, version)
                } else {
                    self.patcher.remote(&document, version)
                };
                if changed {
                    self.notify_remote(session)?;
                }
            }
            RelayMessage::Rejected {
                peer_id,
                version,
                document,
                reason,
                ..
            } if peer_id == self.peer.peer_id => {
                log::warn!("patch rejected: {reason}");
                if self.patcher.reset(&document, version) {
                    self.notify_remote(session)?;
                }
            }
            RelayMessage::Rejected { .. } => {}
            RelayMessage::PeerJoined { peer, .. } => {
                if peer.peer_id != self.peer.peer_id {
                    log::debug!("{} joined {}", peer.name, self.channel);
                }
            }
            RelayMessage::PeerLeft { peer_id, .. } => {
                log::debug!("{peer_id} left {}", self.channel);
            }
            RelayMessage::Abort { reason, .. } => {
                self.abort(session, &reason);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn notify_remote<L: Lifecycle>(&self, session: &mut L) -> RelayResult<()> {
        session.on_remote(&RemoteInfo {
            user_document: self.patcher.user_document(),
        })?;
        Ok(())
    }

    async fn resync<L: Lifecycle>(&mut self, session: &mut L) -> RelayResult<()> {
        let Some((document, version)) = self.relay.document(&self.channel).await else {
            self.abort(session, "channel vanished");
            return Ok(());
        };
        if self.patcher.reset(&document, version) {
            self.notify_remote(session)?;
        }
        Ok(())
    }

    fn abort<L: Lifecycle>(&mut self, session: &mut L, reason: &str) {
        self.state = ConnectionState::Aborted;
        self.receiver = None;
        session.on_abort(&AbortInfo { reason });
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn peer_info(&self) -> &PeerInfo {
        &self.peer
    }

    /// Latest document as this client sees it.
    pub fn user_document(&self) -> &str {
        self.patcher.user_document()
    }

    pub fn version(&self) -> u64 {
        self.patcher.version()
    }

    pub fn has_pending(&self) -> bool {
        self.patcher.has_pending()
    }
}

impl PatchSink for RealtimeClient {
    fn emit_patch(&mut self, serialized: &str) -> FormResult<()> {
        if self.state == ConnectionState::Aborted {
            return Err(FormError::Transport("session aborted".to_string()));
        }
        if self.patcher.local(serialized) {
            log::trace!("queued local snapshot ({} bytes)", serialized.len());
        }
        Ok(())
    }
}

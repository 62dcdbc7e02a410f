//! In-process relay: one room per channel, ordered patch application and
//! fan-out to every subscriber.
//!
//! Each room keeps the authoritative document text and a bounded window of
//! the most recent operations. A patch based on an older version is rebased
//! through every operation applied since, then validated with the transform
//! function before it is accepted. A patch based before the window is
//! rejected and its author resynchronizes.
//!
//! Fan-out uses a tokio broadcast channel per room carrying pre-encoded
//! [`RelayMessage`]s. Subscribers that fall behind by more than the channel
//! capacity observe a lag and must resynchronize.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtform_core::{validate, EditOperation, TransformFn};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::protocol::{PatchRequest, PeerInfo, RelayMessage};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Messages buffered per subscriber before it lags
    pub broadcast_capacity: usize,
    /// Maximum peers per channel
    pub max_peers_per_room: usize,
    /// Applied operations kept per room for rebasing stale patches
    pub history_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
            max_peers_per_room: 64,
            history_limit: 1024,
        }
    }
}

/// Counters for monitoring relay health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub patches_applied: u64,
    pub patches_rejected: u64,
    pub messages_sent: u64,
    pub active_rooms: usize,
}

#[derive(Default)]
struct AtomicRelayStats {
    patches_applied: AtomicU64,
    patches_rejected: AtomicU64,
    messages_sent: AtomicU64,
}

/// What `join` hands back: the channel, its current state, and a receiver
/// subscribed before anything newer was broadcast.
pub struct Joined {
    pub channel: String,
    pub document: String,
    pub version: u64,
    pub receiver: broadcast::Receiver<Arc<Vec<u8>>>,
}

/// Result of one patch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied { version: u64 },
    Rejected { reason: String },
}

struct Room {
    document: String,
    /// Version preceding `history[0]`.
    history_base: u64,
    history: VecDeque<EditOperation>,
    peers: HashMap<Uuid, PeerInfo>,
    sender: broadcast::Sender<Arc<Vec<u8>>>,
}

impl Room {
    fn new(document: String, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            document,
            history_base: 0,
            history: VecDeque::new(),
            peers: HashMap::new(),
            sender,
        }
    }

    fn version(&self) -> u64 {
        self.history_base + self.history.len() as u64
    }

    fn record(&mut self, op: EditOperation, limit: usize) {
        self.history.push_back(op);
        while self.history.len() > limit.max(1) {
            self.history.pop_front();
            self.history_base += 1;
        }
    }

    fn broadcast(&self, msg: &RelayMessage, stats: &AtomicRelayStats) -> RelayResult<usize> {
        let encoded = Arc::new(msg.encode()?);
        let receivers = self.sender.send(encoded).unwrap_or(0);
        stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(receivers)
    }

    /// Rebase `op` from `base` to head and apply it. Returns the rebased
    /// operation and the new text; `Err` carries the reason for rejection.
    fn apply(
        &self,
        base: u64,
        op: &EditOperation,
        transform: TransformFn,
    ) -> Result<(EditOperation, String), String> {
        if base > self.version() {
            return Err(format!("base version {base} is ahead of head {}", self.version()));
        }
        if base < self.history_base {
            return Err(format!(
                "base version {base} predates retained history (from v{})",
                self.history_base
            ));
        }
        let op = self
            .history
            .iter()
            .skip((base - self.history_base) as usize)
            .fold(op.clone(), |op, prior| op.rebase(prior));

        let Some(document) = op.apply(&self.document) else {
            return Err("operation falls outside the document".to_string());
        };
        if !transform(&document) {
            return Err("result is not a valid document".to_string());
        }
        Ok((op, document))
    }
}

/// The relay hub. Cheap to clone; clones share rooms.
#[derive(Clone)]
pub struct Relay {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    config: RelayConfig,
    transform: TransformFn,
    stats: Arc<AtomicRelayStats>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_transform(config, validate)
    }

    pub fn with_transform(config: RelayConfig, transform: TransformFn) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
            transform,
            stats: Arc::new(AtomicRelayStats::default()),
        }
    }

    /// Join `channel`, allocating a fresh 32-char channel id when empty. A
    /// new channel is seeded with `initial_state`.
    pub async fn join(
        &self,
        peer: PeerInfo,
        channel: &str,
        initial_state: &str,
    ) -> RelayResult<Joined> {
        let channel = if channel.is_empty() {
            Uuid::new_v4().simple().to_string()
        } else {
            channel.to_string()
        };

        let mut rooms = self.rooms.write().await;
        if !rooms.contains_key(&channel) {
            if !(self.transform)(initial_state) {
                return Err(RelayError::InvalidDocument);
            }
            log::info!("opening channel {channel}");
            rooms.insert(
                channel.clone(),
                Room::new(initial_state.to_string(), self.config.broadcast_capacity),
            );
        }
        let room = rooms
            .get_mut(&channel)
            .ok_or_else(|| RelayError::UnknownChannel(channel.clone()))?;

        if room.peers.len() >= self.config.max_peers_per_room {
            log::warn!("channel {channel} is full, refusing {}", peer.name);
            return Err(RelayError::RoomFull(channel));
        }

        let receiver = room.sender.subscribe();
        room.peers.insert(peer.peer_id, peer.clone());
        room.broadcast(
            &RelayMessage::PeerJoined {
                channel: channel.clone(),
                peer,
            },
            &self.stats,
        )?;

        Ok(Joined {
            document: room.document.clone(),
            version: room.version(),
            channel,
            receiver,
        })
    }

    /// Apply a patch and fan out the outcome. Rejections are broadcast too,
    /// so the author resynchronizes from its own receiver.
    pub async fn submit(&self, channel: &str, request: PatchRequest) -> RelayResult<PatchOutcome> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(channel)
            .ok_or_else(|| RelayError::UnknownChannel(channel.to_string()))?;
        if !room.peers.contains_key(&request.peer_id) {
            return Err(RelayError::NotJoined(request.peer_id));
        }

        match room.apply(request.base_version, &request.op, self.transform) {
            Ok((op, document)) => {
                room.record(op, self.config.history_limit);
                room.document = document;
                let version = room.version();

                room.broadcast(
                    &RelayMessage::Update {
                        channel: channel.to_string(),
                        author: request.peer_id,
                        version,
                        document: room.document.clone(),
                    },
                    &self.stats,
                )?;
                self.stats.patches_applied.fetch_add(1, Ordering::Relaxed);
                Ok(PatchOutcome::Applied { version })
            }
            Err(reason) => {
                log::warn!("rejecting patch from {} on {channel}: {reason}", request.peer_id);
                room.broadcast(
                    &RelayMessage::Rejected {
                        channel: channel.to_string(),
                        peer_id: request.peer_id,
                        version: room.version(),
                        document: room.document.clone(),
                        reason: reason.clone(),
                    },
                    &self.stats,
                )?;
                self.stats.patches_rejected.fetch_add(1, Ordering::Relaxed);
                Ok(PatchOutcome::Rejected { reason })
            }
        }
    }

    /// Leave a channel. The room is dropped once empty.
    pub async fn leave(&self, channel: &str, peer_id: Uuid) -> RelayResult<()> {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(channel) else {
            return Ok(());
        };
        if room.peers.remove(&peer_id).is_none() {
            return Ok(());
        }
        room.broadcast(
            &RelayMessage::PeerLeft {
                channel: channel.to_string(),
                peer_id,
            },
            &self.stats,
        )?;
        if room.peers.is_empty() {
            log::info!("closing empty channel {channel}");
            rooms.remove(channel);
        }
        Ok(())
    }

    /// Abort every subscriber of `channel` and drop the room.
    pub async fn close_channel(&self, channel: &str, reason: &str) -> RelayResult<()> {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.remove(channel) {
            room.broadcast(
                &RelayMessage::Abort {
                    channel: channel.to_string(),
                    reason: reason.to_string(),
                },
                &self.stats,
            )?;
        }
        Ok(())
    }

    /// Current authoritative text and version of a channel.
    pub async fn document(&self, channel: &str) -> Option<(String, u64)> {
        let rooms = self.rooms.read().await;
        rooms.get(channel).map(|r| (r.document.clone(), r.version()))
    }

    pub async fn peer_count(&self, channel: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(channel).map_or(0, |r| r.peers.len())
    }

    pub async fn stats(&self) -> RelayStats {
        let rooms = self.rooms.read().await;
        RelayStats {
            patches_applied: self.stats.patches_applied.load(Ordering::Relaxed),
            patches_rejected: self.stats.patches_rejected.load(Ordering::Relaxed),
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            active_rooms: rooms.len(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

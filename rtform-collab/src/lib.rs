//! # rtform-collab: Reference transport for rtform sessions
//!
//! An in-process relay that holds the authoritative document per channel,
//! applies text patches in order and fans the result out to every peer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  PatchRequest   ┌─────────────┐
//! │ RealtimeClient │ ──────────────► │    Relay    │
//! │ + TextPatcher  │ ◄────────────── │ (per room:  │
//! └───────┬────────┘  RelayMessage   │  doc+ops)   │
//!         │           (bincode)      └──────┬──────┘
//!         ▼                                 │
//! ┌────────────────┐                ┌───────┴───────┐
//! │  FormSession   │                │   broadcast   │
//! │  (Lifecycle)   │                │   (fan-out)   │
//! └────────────────┘                └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: wire messages (bincode-encoded `RelayMessage`)
//! - [`relay`]: rooms, ordered patch application, fan-out
//! - [`patcher`]: snapshot to operation conversion, local/remote merging
//! - [`client`]: drives a `Lifecycle` against the relay

pub mod client;
pub mod error;
pub mod patcher;
pub mod protocol;
pub mod relay;

pub use client::{ConnectionState, RealtimeClient};
pub use error::{RelayError, RelayResult};
pub use patcher::TextPatcher;
pub use protocol::{PatchRequest, PeerInfo, RelayMessage};
pub use relay::{Joined, PatchOutcome, Relay, RelayConfig, RelayStats};

//! Text patcher: turns whole-document snapshots into edit operations and
//! keeps the client's view consistent with the relay.
//!
//! Two texts are tracked:
//! - `authoritative`: the last document the relay confirmed, at `version`;
//! - `user`: what the local session sees, i.e. authoritative plus any local
//!   changes not yet confirmed.
//!
//! At most one operation is in flight. Remote updates arriving meanwhile are
//! merged by rebasing the unconfirmed local change over the remote one.

use rtform_core::{DiffEngine, EditOperation, PrefixSuffixDiff, TransformFn};

pub struct TextPatcher<D = PrefixSuffixDiff> {
    authoritative: String,
    version: u64,
    user: String,
    in_flight: bool,
    /// Local changes made since the last submission.
    dirty: bool,
    transform: TransformFn,
    diff: D,
}

impl TextPatcher<PrefixSuffixDiff> {
    pub fn new(document: impl Into<String>, version: u64, transform: TransformFn) -> Self {
        Self::with_diff(document, version, transform, PrefixSuffixDiff)
    }
}

impl<D: DiffEngine> TextPatcher<D> {
    pub fn with_diff(
        document: impl Into<String>,
        version: u64,
        transform: TransformFn,
        diff: D,
    ) -> Self {
        let document = document.into();
        Self {
            user: document.clone(),
            authoritative: document,
            version,
            in_flight: false,
            dirty: false,
            transform,
            diff,
        }
    }

    pub fn user_document(&self) -> &str {
        &self.user
    }

    pub fn authoritative(&self) -> &str {
        &self.authoritative
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether local changes are waiting to be confirmed.
    pub fn has_pending(&self) -> bool {
        self.user != self.authoritative
    }

    /// Adopt a new local snapshot. Returns `false` if nothing changed or the
    /// snapshot fails validation.
    pub fn local(&mut self, serialized: &str) -> bool {
        if serialized == self.user {
            return false;
        }
        if !(self.transform)(serialized) {
            log::warn!("refusing invalid local snapshot");
            return false;
        }
        self.user = serialized.to_string();
        self.dirty = true;
        true
    }

    /// Next operation to submit, against the current version. `None` while
    /// another operation is in flight or when there is nothing to send.
    pub fn take_pending(&mut self) -> Option<(u64, EditOperation)> {
        if self.in_flight || !self.has_pending() {
            return None;
        }
        let op = self.diff.diff(&self.authoritative, &self.user);
        self.in_flight = true;
        self.dirty = false;
        Some((self.version, op))
    }

    /// Another peer's update. Returns whether the user document changed.
    pub fn remote(&mut self, document: &str, version: u64) -> bool {
        if version <= self.version {
            log::debug!("ignoring stale update v{version} (at v{})", self.version);
            return false;
        }
        let local = self.diff.diff(&self.authoritative, &self.user);
        let incoming = self.diff.diff(&self.authoritative, document);
        self.authoritative = document.to_string();
        self.version = version;

        let merged = if local.is_noop() {
            document.to_string()
        } else {
            match local
                .rebase(&incoming)
                .apply(document)
                .filter(|t| (self.transform)(t))
            {
                Some(merged) => merged,
                None => {
                    log::warn!("local change conflicts with v{version}, dropping it");
                    self.dirty = false;
                    document.to_string()
                }
            }
        };

        let changed = merged != self.user;
        self.user = merged;
        changed
    }

    /// Our own operation came back applied. Returns whether the user
    /// document changed.
    ///
    /// An acknowledgement at or behind the current version (left over from
    /// before a resync) only frees the in-flight slot.
    pub fn acknowledge(&mut self, document: &str, version: u64) -> bool {
        if version <= self.version {
            log::debug!("stale acknowledgement v{version} (at v{})", self.version);
            self.in_flight = false;
            return false;
        }
        self.authoritative = document.to_string();
        self.version = version;
        self.in_flight = false;
        if self.dirty {
            return false;
        }
        let changed = self.user != document;
        self.user = document.to_string();
        changed
    }

    /// Our operation was refused, or we lost track: adopt `document` and
    /// discard unconfirmed local changes.
    pub fn reset(&mut self, document: &str, version: u64) -> bool {
        self.authoritative = document.to_string();
        self.version = version;
        self.in_flight = false;
        self.dirty = false;
        let changed = self.user != document;
        self.user = document.to_string();
        changed
    }
}

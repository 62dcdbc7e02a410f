//! Session bootstrap: channel identity and symmetric key from a share token.
//!
//! Token layout: `#` + 32-char channel id + key. With no token a fresh key
//! is generated and the channel stays empty until the transport assigns one;
//! the token is then rewritten once so reloading or sharing it rejoins the
//! same session. Short or odd tokens produce a degenerate identity silently;
//! rejecting them is the transport's call.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Length of a channel identity, in chars.
pub const CHANNEL_ID_LEN: usize = 32;

/// Source of fresh key material.
pub trait KeyGenerator {
    /// A new symmetric key, in its textual form.
    fn generate_key(&self) -> String;

    /// A random display name for the transport.
    fn user_name(&self) -> String;
}

/// Thread-RNG backed generator: 32-byte keys, 8-byte user names, base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeys;

impl RandomKeys {
    fn random_b64(len: usize) -> String {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        STANDARD.encode(bytes)
    }
}

impl KeyGenerator for RandomKeys {
    fn generate_key(&self) -> String {
        // '/' would be ambiguous inside a URL fragment
        Self::random_b64(32).replace('/', "-")
    }

    fn user_name(&self) -> String {
        Self::random_b64(8)
    }
}

/// Channel identity plus symmetric key for one collaborative document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    channel: String,
    key: String,
}

impl SessionIdentity {
    /// Derive from the current share token, generating a key when absent.
    pub fn bootstrap(token: Option<&str>, keys: &dyn KeyGenerator) -> Self {
        match token {
            None => Self {
                channel: String::new(),
                key: keys.generate_key(),
            },
            Some(token) => Self::from_token(token),
        }
    }

    /// Split a token into channel (first 32 chars) and key (the rest).
    pub fn from_token(token: &str) -> Self {
        let token = token.strip_prefix('#').unwrap_or(token);
        let split = token
            .char_indices()
            .nth(CHANNEL_ID_LEN)
            .map_or(token.len(), |(i, _)| i);
        let (channel, key) = token.split_at(split);
        Self {
            channel: channel.to_string(),
            key: key.to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn has_channel(&self) -> bool {
        !self.channel.is_empty()
    }

    /// Record the channel the transport assigned. Only an empty channel is
    /// ever filled in; the identity never changes once set.
    pub fn assign_channel(&mut self, channel: &str) -> bool {
        if self.channel.is_empty() {
            self.channel = channel.to_string();
            return true;
        }
        if self.channel != channel {
            log::warn!(
                "transport assigned channel {channel} but session is bound to {}; keeping the original",
                self.channel
            );
        }
        false
    }

    /// `channel + key`, without the leading `#`.
    pub fn share_token(&self) -> String {
        format!("{}{}", self.channel, self.key)
    }
}

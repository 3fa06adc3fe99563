//! Stored Entry Module
//!
//! A value plus its expiry, as held by the in-memory store.

// == Entry ==
/// A stored value with optional expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = never expires
    pub expires_at: Option<u64>,
}

impl Entry {
    /// Creates an entry written at `now_ms`. A `ttl_secs` of 0 never expires.
    pub fn new(value: Vec<u8>, ttl_secs: u32, now_ms: u64) -> Self {
        let expires_at = (ttl_secs > 0).then(|| now_ms + u64::from(ttl_secs) * 1000);
        Self { value, expires_at }
    }

    /// An entry is expired once `now_ms` reaches its expiration time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    /// Remaining TTL in whole seconds, 0 if the entry never expires.
    pub fn ttl_remaining(&self, now_ms: u64) -> u32 {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms) / 1000)
            .map(|secs| u32::try_from(secs).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }
}

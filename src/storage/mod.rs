//! Storage Module
//!
//! TTL-aware get/set/delete over the backing store.
//!
//! `Store` has two implementations: [`CassandraStore`], which talks to the
//! column store, and [`MemoryStore`], the in-memory double used by tests.

mod cassandra;
mod clock;
mod entry;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use cassandra::CassandraStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::Entry;
pub use memory::MemoryStore;

/// Largest TTL the backing store accepts (20 years), in seconds.
pub const MAX_TTL_SECS: u32 = 630_720_000;

// == Datum ==
/// A value read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    pub value: Vec<u8>,
    /// Seconds until expiry at read time; 0 when the value never expires.
    pub ttl: u32,
}

// == Store ==
/// Access to the underlying key/value data.
///
/// Implementations must be safe to call concurrently; this layer adds no
/// locking, retries or timeouts of its own.
#[async_trait]
pub trait Store: Send + Sync {
    /// Upserts `value` under `key`. A `ttl` of 0 never expires; otherwise the
    /// value becomes unreadable `ttl` seconds after this write.
    async fn set(&self, key: &str, value: &[u8], ttl: u32) -> Result<()>;

    /// Reads `key`, failing with `StorageError::NotFound` when absent or expired.
    async fn get(&self, key: &str) -> Result<Datum>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Releases the session. Best-effort; called once at shutdown.
    async fn close(&self);
}

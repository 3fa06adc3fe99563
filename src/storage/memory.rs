//! In-memory store
//!
//! Test double for [`Store`]. Keeps values in a `HashMap`, applies TTLs
//! against an injectable [`Clock`], counts calls and can be told to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Clock, Datum, Entry, Store, SystemClock};
use crate::error::{Result, StorageError};

// == Memory Store ==
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    calls: AtomicUsize,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of `set`/`get`/`delete` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While `failing`, every operation returns a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(&self, key: &str, value: &[u8], ttl: u32) -> Result<()> {
        self.enter()?;
        let entry = Entry::new(value.to_vec(), ttl, self.clock.now_ms());
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Datum> {
        self.enter()?;
        let now = self.clock.now_ms();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    return Ok(Datum {
                        value: entry.value.clone(),
                        ttl: entry.ttl_remaining(now),
                    });
                }
                Some(_) => {}
                None => return Err(StorageError::NotFound(key.to_string())),
            }
        }

        // Expired: drop it, unless a concurrent write replaced it meanwhile.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.enter()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;

    fn store_with_clock() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();

        store.set("key1", b"value1", 0).await.unwrap();
        let datum = store.get("key1").await.unwrap();

        assert_eq!(datum.value, b"value1");
        assert_eq!(datum.ttl, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = MemoryStore::new();

        let result = store.get("nonexistent").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();

        store.set("key1", b"value1", 0).await.unwrap();
        store.delete("key1").await.unwrap();
        store.delete("key1").await.unwrap();
        store.delete("never-written").await.unwrap();

        assert!(store.is_empty().await);
        assert!(matches!(store.get("key1").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let (clock, store) = store_with_clock();

        store.set("key1", b"value1", 5).await.unwrap();
        clock.advance_secs(4);
        store.set("key1", b"value2", 5).await.unwrap();
        clock.advance_secs(4);

        let datum = store.get("key1").await.unwrap();
        assert_eq!(datum.value, b"value2");
        assert_eq!(datum.ttl, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let (clock, store) = store_with_clock();

        store.set("key1", b"value1", 5).await.unwrap();
        let datum = store.get("key1").await.unwrap();
        assert!(datum.ttl <= 5);

        clock.advance_ms(5_001);
        let result = store.get("key1").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(store.is_empty().await, "Expired entry should be dropped on read");
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let (clock, store) = store_with_clock();

        store.set("key1", b"value1", 0).await.unwrap();
        clock.advance_secs(10 * 365 * 24 * 3600);

        assert!(store.get("key1").await.is_ok());
    }

    #[tokio::test]
    async fn test_calls_are_counted() {
        let store = MemoryStore::new();

        store.set("a", b"1", 0).await.unwrap();
        let _ = store.get("a").await;
        let _ = store.get("b").await;
        store.delete("a").await.unwrap();

        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MemoryStore::new();
        store.set("a", b"1", 0).await.unwrap();

        store.set_failing(true);
        assert!(matches!(store.get("a").await, Err(StorageError::Backend(_))));
        assert!(matches!(store.set("a", b"2", 0).await, Err(StorageError::Backend(_))));
        assert!(matches!(store.delete("a").await, Err(StorageError::Backend(_))));

        store.set_failing(false);
        assert_eq!(store.get("a").await.unwrap().value, b"1");
    }

    #[tokio::test]
    async fn test_close() {
        let store = MemoryStore::new();
        store.close().await;

        assert!(store.is_closed());
        assert!(matches!(store.get("a").await, Err(StorageError::Closed)));
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_applied_wins() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.set("shared", &[i], 0).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let datum = store.get("shared").await.unwrap();
        assert_eq!(datum.value.len(), 1);
        assert!(datum.value[0] < 16);
    }
}

//! kvfront - HTTP key/value front end
//!
//! Stores, fetches and deletes opaque byte values addressed by a single
//! path-segment key, with optional per-value TTL, on top of a Cassandra
//! column store.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod storage;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{Problem, StorageError};
pub use logging::{Level, Logger};
pub use storage::{CassandraStore, MemoryStore, Store};

//! Persistence for chat sessions.

pub mod kv_store;
pub mod session_store;

pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreFuture};
pub use session_store::SessionStore;

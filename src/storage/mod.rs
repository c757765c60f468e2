//! Local persistence: the key-value store capability and the favorites
//! collection built on it.

mod favorites;
mod kv;
mod types;

pub use favorites::{FavoritesRepository, FAVORITES_KEY};
pub use kv::{atomic_write, FileStore, KeyValueStore, MemoryStore};
pub use types::{ImportError, StoreError};

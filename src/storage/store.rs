//! In-Memory Key-Value Store
//!
//! A `HashMap<Bytes, Bytes>` behind one `RwLock`.
//!
//! ## Concurrency Model
//!
//! - `get` and `len` take the read lock, so any number of readers proceed together
//! - `set` takes the write lock and excludes every other reader and writer
//!
//! The server only ever calls the store from its command serializer, but the
//! lock belongs to the store's own contract: a `Store` shared through an
//! `Arc` across threads is safe without any outside coordination.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe key-value map with upsert and lookup.
///
/// # Example
///
/// ```
/// use keyline::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
/// store.set(Bytes::from("foo"), Bytes::from("bar"));
/// assert_eq!(store.get(b"foo"), Some(Bytes::from("bar")));
/// assert_eq!(store.get(b"missing"), None);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the value for `key`.
    pub fn set(&self, key: Bytes, value: Bytes) {
        let mut data = self.data.write().unwrap();
        data.insert(key, value);
    }

    /// Returns the value for `key`, or `None` if it was never set.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let data = self.data.read().unwrap();
        data.get(key).cloned()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

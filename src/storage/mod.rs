//! Storage Module
//!
//! The in-memory key-value store mutated by the command serializer.
//! No persistence, no expiry, no eviction: keys live until the process exits.

pub mod store;

pub use store::Store;

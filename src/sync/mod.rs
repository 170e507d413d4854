//! Synchronization layer: the remote store abstraction, the sled-backed
//! default implementation, and the engine that reconciles the session
//! with the store under debounced writes and offline degradation.

pub mod engine;
pub mod sled_store;
pub mod store;

pub use engine::SyncEngine;
pub use sled_store::SledStore;
pub use store::{DocChange, RemoteStore, StoreError};

//! The remote document store abstraction. The sync engine depends on
//! exactly five capabilities: anonymous identity issuance, a read-once
//! ordered query, a realtime document subscription whose notifications
//! report pending local writes, a merge-semantics document write, and
//! append-only history writes. Anything providing these can back a
//! session.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("local store: {0}")]
    Local(#[from] sled::Error),
}

/// One change notification for a subscribed document.
///
/// `pending_local_write` marks an echo of this session's own in-flight
/// write; the engine must ignore those to avoid a reprocessing loop.
#[derive(Debug, Clone)]
pub struct DocChange {
    /// The document contents, or `None` when it does not exist.
    pub data: Option<Value>,
    pub pending_local_write: bool,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Acquire (or restore) an anonymous identity.
    async fn authenticate(&self) -> Result<String, StoreError>;

    /// One-shot query: top `limit` documents of a collection ordered
    /// descending by a numeric field.
    async fn fetch_top(
        &self,
        collection: &str,
        order_field: &str,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;

    /// Subscribe to a document. The receiver yields the current state
    /// first, then every subsequent change.
    async fn subscribe(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<DocChange>, StoreError>;

    /// Merge-write a document at top-level-key granularity, stamping a
    /// fresh server timestamp. Returns the assigned stamp (epoch ms).
    async fn write_merge(
        &self,
        collection: &str,
        doc_id: &str,
        patch: Value,
    ) -> Result<i64, StoreError>;

    /// Append entries to a document's history sub-collection.
    async fn append_history(
        &self,
        collection: &str,
        doc_id: &str,
        entries: &[Value],
    ) -> Result<(), StoreError>;
}

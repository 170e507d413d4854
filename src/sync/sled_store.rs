//! Local sled-backed document store. This is both the offline cache
//! and the default backend: documents are JSON blobs in a `docs` tree,
//! history entries land append-only in a `history` tree, and in-process
//! subscribers are notified on every write the same way a remote
//! backend would notify: an echo flagged as a pending local write
//! first, then the committed change.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::sync::store::{DocChange, RemoteStore, StoreError};

const IDENTITY_KEY: &[u8] = b"anon_id";

pub struct SledStore {
    db: sled::Db,
    docs: sled::Tree,
    history: sled::Tree,
    meta: sled::Tree,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<DocChange>>>>,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let docs = db.open_tree("docs")?;
        let history = db.open_tree("history")?;
        let meta = db.open_tree("meta")?;
        Ok(Self {
            db,
            docs,
            history,
            meta,
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    fn doc_key(collection: &str, doc_id: &str) -> String {
        format!("{}/{}", collection, doc_id)
    }

    fn read_doc(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.docs.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn notify(&self, key: &str, change: DocChange) {
        let mut subs = self.subscribers.lock().expect("subscriber lock");
        if let Some(senders) = subs.get_mut(key) {
            senders.retain(|tx| tx.send(change.clone()).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for SledStore {
    async fn authenticate(&self) -> Result<String, StoreError> {
        if let Some(bytes) = self.meta.get(IDENTITY_KEY)? {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        let id = Uuid::new_v4().to_string();
        self.meta.insert(IDENTITY_KEY, id.as_bytes())?;
        self.meta.flush_async().await?;
        debug!("Issued new anonymous identity {}", id);
        Ok(id)
    }

    async fn fetch_top(
        &self,
        collection: &str,
        order_field: &str,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let prefix = format!("{}/", collection);
        let mut docs = Vec::new();
        for entry in self.docs.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                docs.push(value);
            }
        }
        docs.sort_by_key(|doc| {
            std::cmp::Reverse(doc.get(order_field).and_then(Value::as_i64).unwrap_or(0))
        });
        docs.truncate(limit);
        Ok(docs)
    }

    async fn subscribe(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<DocChange>, StoreError> {
        let key = Self::doc_key(collection, doc_id);
        let current = self.read_doc(&key)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(DocChange {
            data: current,
            pending_local_write: false,
        });
        self.subscribers
            .lock()
            .expect("subscriber lock")
            .entry(key)
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn write_merge(
        &self,
        collection: &str,
        doc_id: &str,
        patch: Value,
    ) -> Result<i64, StoreError> {
        let key = Self::doc_key(collection, doc_id);
        let stamp = Utc::now().timestamp_millis();
        let mut doc = self
            .read_doc(&key)?
            .unwrap_or_else(|| Value::Object(Default::default()));
        if !doc.is_object() {
            doc = Value::Object(Default::default());
        }
        if let (Some(target), Some(source)) = (doc.as_object_mut(), patch.as_object()) {
            for (field, value) in source {
                target.insert(field.clone(), value.clone());
            }
            target.insert("lastActive".into(), Value::from(stamp));
        }

        // Mirror a remote backend's notification order: the local echo
        // arrives before the write is durable.
        self.notify(
            &key,
            DocChange {
                data: Some(doc.clone()),
                pending_local_write: true,
            },
        );
        self.docs.insert(key.as_bytes(), serde_json::to_vec(&doc)?)?;
        self.docs.flush_async().await?;
        self.notify(
            &key,
            DocChange {
                data: Some(doc),
                pending_local_write: false,
            },
        );
        debug!("Merged write to {} at stamp {}", key, stamp);
        Ok(stamp)
    }

    async fn append_history(
        &self,
        collection: &str,
        doc_id: &str,
        entries: &[Value],
    ) -> Result<(), StoreError> {
        for entry in entries {
            let seq = self.db.generate_id()?;
            let key = format!("{}/{}/{:020}", collection, doc_id, seq);
            self.history
                .insert(key.as_bytes(), serde_json::to_vec(entry)?)?;
        }
        self.history.flush_async().await?;
        Ok(())
    }
}

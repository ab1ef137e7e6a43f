//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Batches live in a `HashMap` behind `std::sync::RwLock`, keyed by a
//! freshly generated UUID per call.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{CanonicalDocument, DataRef};

use super::Store;

/// Backend tag carried by every [`DataRef`] this store issues.
pub const MEMORY_BACKEND: &str = "memory";

/// In-memory store keyed by batch UUID.
pub struct InMemoryStore {
    batches: RwLock<HashMap<String, Vec<CanonicalDocument>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
        }
    }

    /// Number of batches stored so far.
    pub fn batch_count(&self) -> usize {
        self.batches.read().map(|b| b.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn store_documents(&self, docs: &[CanonicalDocument]) -> Result<DataRef> {
        let id = Uuid::new_v4().to_string();
        let mut batches = self
            .batches
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        batches.insert(id.clone(), docs.to_vec());
        Ok(DataRef {
            backend: MEMORY_BACKEND.to_string(),
            id,
        })
    }

    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<CanonicalDocument>>> {
        if data_ref.backend != MEMORY_BACKEND {
            return Ok(None);
        }
        let batches = self
            .batches
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(batches.get(&data_ref.id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn doc(id: &str) -> CanonicalDocument {
        CanonicalDocument {
            id: id.to_string(),
            content: format!("content of {}", id),
            title: id.to_string(),
            source: "jira".to_string(),
            url: String::new(),
            metadata: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_a_batch_in_order() {
        let store = InMemoryStore::new();
        let docs = vec![doc("A-2"), doc("A-1")];

        let r = store.store_documents(&docs).await.unwrap();
        assert_eq!(r.backend, "memory");

        let loaded = store.load_documents(&r).await.unwrap().unwrap();
        assert_eq!(loaded, docs);
    }

    #[tokio::test]
    async fn each_call_is_a_new_batch() {
        let store = InMemoryStore::new();
        let docs = vec![doc("A-1")];

        let a = store.store_documents(&docs).await.unwrap();
        let b = store.store_documents(&docs).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.batch_count(), 2);
    }

    #[tokio::test]
    async fn unknown_ref_is_none() {
        let store = InMemoryStore::new();
        let missing = DataRef {
            backend: "memory".to_string(),
            id: "nope".to_string(),
        };
        assert!(store.load_documents(&missing).await.unwrap().is_none());
    }
}

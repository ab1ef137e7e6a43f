//! Storage abstraction for Jira Harness.
//!
//! The [`Store`] trait is the seam to whatever persists normalized
//! documents for later pipeline stages. A store receives an ordered batch
//! of [`CanonicalDocument`]s and returns an opaque [`DataRef`] that can be
//! handed to downstream consumers.
//!
//! Stores are append-only from the harness's point of view: storing the
//! same batch twice yields two independent handles. Deduplication, if any,
//! is the responsibility of the consumer.
//!
//! Implementations must be `Send + Sync` so a single store can be shared
//! across concurrently scheduled activities.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CanonicalDocument, DataRef};

/// Abstract document storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`store_documents`](Store::store_documents) | Persist a batch, return its handle |
/// | [`load_documents`](Store::load_documents) | Read a batch back by handle |
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist an ordered batch of documents as one unit.
    async fn store_documents(&self, docs: &[CanonicalDocument]) -> Result<DataRef>;

    /// Load a previously stored batch in its original order.
    ///
    /// Returns `Ok(None)` when the handle is unknown to this store.
    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<CanonicalDocument>>>;
}

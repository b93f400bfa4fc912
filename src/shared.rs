use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Number;
use crate::document::{Document, MetadataFilter};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::search::Retrieved;

/// Thread-safe handle to a [`VectorIndex`].
///
/// Writers take the lock exclusively, so every `add` is serialized against
/// other `add`s and against in-flight searches. Searches share the lock and
/// return owned results so no guard outlives the call.
#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<VectorIndex>>,
}

impl SharedIndex {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    pub fn add<V, C>(&self, vectors: &[V], chunks: Vec<C>) -> Result<()>
    where
        V: AsRef<[Number]>,
        C: Into<Document>,
    {
        self.inner.write().add(vectors, chunks)
    }

    pub fn search(&self, query: &[Number], top_k: usize) -> Result<Vec<Retrieved>> {
        let index = self.inner.read();
        let hits = index.search(query, top_k)?;
        Ok(hits.iter().map(|hit| hit.to_retrieved()).collect())
    }

    pub fn search_filtered(
        &self,
        query: &[Number],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Retrieved>> {
        let index = self.inner.read();
        let hits = index.search_filtered(query, top_k, filter)?;
        Ok(hits.iter().map(|hit| hit.to_retrieved()).collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Consume the handle, returning the index if no other clone is alive.
    pub fn try_into_inner(self) -> std::result::Result<VectorIndex, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

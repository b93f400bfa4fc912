//! Retrieval strategies over caller-owned collections.

use crate::chunker::Chunker;
use crate::config::State;
use crate::document::{Document, MetadataFilter};
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::search::Retrieved;

pub trait Retriever {
    /// Up to `top_k` documents relevant to `query`, best first.
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Retrieved>> {
        self.retrieve_filtered(query, top_k, &MetadataFilter::default())
    }

    /// As [`retrieve`](Retriever::retrieve), limited to documents whose
    /// metadata satisfies `filter`.
    fn retrieve_filtered(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Retrieved>>;
}

/// Substring matching: a document is relevant when any lowercased,
/// whitespace-separated query word occurs anywhere in its lowercased text.
/// Results keep collection order.
pub struct KeywordRetriever<'a> {
    documents: &'a [Document],
}

impl<'a> KeywordRetriever<'a> {
    pub fn new(documents: &'a [Document]) -> Self {
        Self { documents }
    }
}

impl Retriever for KeywordRetriever<'_> {
    fn retrieve_filtered(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Retrieved>> {
        let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

        let results: Vec<Retrieved> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| filter.matches(&doc.metadata))
            .filter(|(_, doc)| {
                let content = doc.text.to_lowercase();
                keywords.iter().any(|keyword| content.contains(keyword.as_str()))
            })
            .take(top_k)
            .map(|(position, doc)| Retrieved {
                position,
                distance: None,
                document: doc.clone(),
            })
            .collect();

        tracing::debug!(keywords = keywords.len(), results = results.len(), "keyword retrieval");
        Ok(results)
    }
}

/// Chunk, embed and index documents; answer queries by nearest neighbors.
/// Queries go through the LSH side index only when the index was built with
/// [`SearchMethod::Ann`](crate::config::SearchMethod::Ann).
pub struct VectorRetriever<E> {
    chunker: Chunker,
    embedder: E,
    index: VectorIndex,
}

impl<E: Embedder> VectorRetriever<E> {
    pub fn new(chunker: Chunker, embedder: E, index: VectorIndex) -> Result<Self> {
        RagError::check_dimensions(index.dimensions(), embedder.dimensions())?;
        Ok(Self {
            chunker,
            embedder,
            index,
        })
    }

    pub fn from_state(state: &State, embedder: E) -> Result<Self> {
        let chunker = Chunker::new(state.chunk_size, state.overlap)?;
        Self::new(chunker, embedder, VectorIndex::from_state(state)?)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Chunk `document`, embed the chunks in one batch and index them. Each
    /// chunk carries the document's metadata plus `chunk_index` and `start`.
    /// Returns the number of chunks added.
    pub fn ingest(&mut self, document: &Document) -> Result<usize> {
        let chunks: Vec<Document> = self
            .chunker
            .chunks(&document.text)
            .map(|chunk| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index", chunk.index.to_string());
                metadata.insert("start", chunk.start.to_string());
                Document {
                    text: chunk.text.to_string(),
                    metadata,
                }
            })
            .collect();

        if chunks.is_empty() {
            tracing::warn!("skipping empty document");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let count = chunks.len();
        self.index.add(&vectors, chunks)?;

        tracing::info!(chunks = count, total = self.index.len(), "ingested document");
        Ok(count)
    }
}

impl<E: Embedder> Retriever for VectorRetriever<E> {
    fn retrieve_filtered(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Retrieved>> {
        let query_vector = self.embedder.embed(query)?;
        let (hits, _) = self
            .index
            .search_configured(&query_vector, top_k, Some(filter))?;
        Ok(hits.iter().map(|hit| hit.to_retrieved()).collect())
    }
}

//! Retrieval core for RAG pipelines: overlapping text chunking, pluggable
//! embedders, and an append-only vector index answering nearest-neighbor
//! queries under squared Euclidean distance, plus a retrieve-then-generate
//! pipeline over pluggable retrievers and generators.
//!
//! ```
//! use ragcore::{Chunker, Embedder, HashingEmbedder, VectorIndex};
//!
//! let chunker = Chunker::new(10, 3).unwrap();
//! let embedder = HashingEmbedder::new(32).unwrap();
//! let mut index = VectorIndex::new(32).unwrap();
//!
//! let text = "vectors and chunks stay paired by position";
//! let chunks: Vec<&str> = chunker.chunks(text).map(|c| c.text).collect();
//! let vectors = embedder.embed_batch(&chunks).unwrap();
//! index.add(&vectors, chunks).unwrap();
//!
//! let query = embedder.embed("paired chunks").unwrap();
//! let hits = index.search(&query, 2).unwrap();
//! assert_eq!(hits.len(), 2);
//! ```

pub mod ann;
pub mod chunker;
pub mod config;
pub mod document;
pub mod embedder;
pub mod error;
pub mod generator;
pub mod index;
pub mod logging;
pub mod pipeline;
pub mod retriever;
pub mod search;
pub mod shared;
pub mod vector_ops;

pub use ann::AnnConfig;
pub use chunker::{Chunk, Chunker, Chunks};
pub use config::{Number, SearchMethod, State};
pub use document::{Document, Metadata, MetadataFilter};
pub use embedder::{Embedder, HashingEmbedder};
pub use error::{RagError, Result};
pub use generator::{ConcatGenerator, Generator};
pub use index::VectorIndex;
pub use pipeline::{Answer, RagPipeline};
pub use retriever::{KeywordRetriever, Retriever, VectorRetriever};
pub use search::{Retrieved, SearchHit, SearchTimings};
pub use shared::SharedIndex;

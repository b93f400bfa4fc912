use serde::Serialize;

use crate::document::MetadataFilter;
use crate::error::Result;
use crate::generator::Generator;
use crate::retriever::Retriever;
use crate::search::Retrieved;

/// A generated answer and the context it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Retrieved>,
}

/// Retrieve, then generate. Either half can be swapped independently.
pub struct RagPipeline<R, G> {
    retriever: R,
    generator: G,
    top_k: usize,
}

impl<R: Retriever, G: Generator> RagPipeline<R, G> {
    pub fn new(retriever: R, generator: G, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    pub fn run(&self, query: &str) -> Result<Answer> {
        self.run_filtered(query, &MetadataFilter::default())
    }

    pub fn run_filtered(&self, query: &str, filter: &MetadataFilter) -> Result<Answer> {
        let sources = self.retriever.retrieve_filtered(query, self.top_k, filter)?;
        let text = self.generator.generate(query, &sources)?;
        tracing::info!(sources = sources.len(), "generated answer");
        Ok(Answer { text, sources })
    }
}

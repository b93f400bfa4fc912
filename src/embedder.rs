use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::config::Number;
use crate::error::{RagError, Result};
use crate::vector_ops::normalize_vector;

/// Maps text to fixed-length vectors.
///
/// Implementations may be slow or remote; callers should prefer
/// [`embed_batch`](Embedder::embed_batch) when they have several texts.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<Number>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Feature-hashing embedder: every lowercased alphanumeric token adds ±1 to
/// a bucket chosen by its SHA-256 digest, and the sum is L2-normalized.
///
/// Deterministic across runs and platforms. Texts sharing vocabulary land
/// close together; it carries no semantics beyond that.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::invalid_config("dimensions must be positive"));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, token: &str) -> (usize, Number) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        let mut vector = vec![0.0; self.dimensions];
        for token in tokens(text) {
            let (bucket, sign) = self.bucket(&token);
            vector[bucket] += sign;
        }
        normalize_vector(&mut vector);
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>> {
        texts.par_iter().map(|text| self.embed(text)).collect()
    }
}

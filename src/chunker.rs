//! Fixed-size, overlapping text windows.
//!
//! Offsets and lengths are measured in `char`s, so a window never splits a
//! UTF-8 sequence.

use serde::Serialize;
use std::iter::FusedIterator;

use crate::error::{RagError, Result};

/// Window configuration. Construction guarantees `0 <= overlap < chunk_size`,
/// so every step advances by at least one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// One window of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk<'a> {
    /// Position in the chunk sequence.
    pub index: usize,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    pub text: &'a str,
}

impl Chunk<'_> {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::invalid_config("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(RagError::invalid_config(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive chunks.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Lazily walks `text`. The returned iterator is `Clone`, so a copy taken
    /// before iteration replays the same sequence.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            chunk_size: self.chunk_size,
            stride: self.stride(),
            byte_pos: 0,
            char_pos: 0,
            index: 0,
        }
    }

    /// Eagerly collects the chunk texts.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.chunks(text).map(|chunk| chunk.text.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    chunk_size: usize,
    stride: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        if self.byte_pos >= self.text.len() {
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let (chunk_bytes, chunk_chars) = advance(rest, self.chunk_size);
        let (stride_bytes, stride_chars) = advance(rest, self.stride);

        let chunk = Chunk {
            index: self.index,
            start: self.char_pos,
            end: self.char_pos + chunk_chars,
            text: &rest[..chunk_bytes],
        };

        self.byte_pos += stride_bytes;
        self.char_pos += stride_chars;
        self.index += 1;
        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}

/// Byte length and char count of the first `n` chars of `s`, or of all of `s`
/// when it is shorter.
fn advance(s: &str, n: usize) -> (usize, usize) {
    match s.char_indices().nth(n) {
        Some((byte, _)) => (byte, n),
        None => (s.len(), s.chars().count()),
    }
}

//! Recursive character text splitter.
//!
//! Splits document text into [`RawChunk`]s of at most `chunk_size`
//! characters, sharing up to `chunk_overlap` characters of trailing context
//! between neighbours.
//!
//! # Algorithm
//!
//! 1. Pick the first separator of `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` splits into single characters).
//! 2. Split on it. Pieces shorter than `chunk_size` are buffered; a piece
//!    that is too long flushes the buffer and is split recursively with the
//!    remaining separators.
//! 3. Buffered pieces are merged back, joined by the separator, until the
//!    next piece would overflow `chunk_size`. Then the merged chunk is
//!    emitted and pieces are dropped from the front until at most
//!    `chunk_overlap` characters remain to seed the next chunk.
//!
//! Lengths count `char`s, so a split never lands inside a UTF-8 sequence.
//! The output depends only on the input text and the two sizes.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::split::RecursiveCharacterSplitter;
//!
//! let splitter = RecursiveCharacterSplitter::new(1000, 200).unwrap();
//! let chunks = splitter.split_text("Hello world.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use std::collections::VecDeque;

use crate::error::IndexError;
use crate::models::{RawChunk, SourceText, Splitting};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterSplitter {
    /// Fails with [`IndexError::InvalidSplitting`] unless
    /// `0 < chunk_overlap + 1 <= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IndexError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(IndexError::InvalidSplitting {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_splitting(splitting: &Splitting) -> Result<Self, IndexError> {
        Self::new(splitting.chunk_size, splitting.chunk_overlap)
    }

    /// Split every section, each chunk inheriting its section's metadata.
    pub fn split_sources(&self, sources: &[SourceText]) -> Vec<RawChunk> {
        sources
            .iter()
            .flat_map(|source| {
                self.split_text(&source.text)
                    .into_iter()
                    .map(|content| RawChunk {
                        content,
                        meta: source.meta.clone(),
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &DEFAULT_SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut rest: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                rest = &[];
                break;
            }
            if text.contains(sep) {
                separator = sep;
                rest = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if rest.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, rest));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut merged, &current, separator);
                // Keep at most `chunk_overlap` chars as the seed of the next chunk.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + sep_len > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    let joiner = if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(front) + joiner);
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut merged, &current, separator);
        merged
    }
}

fn push_joined(out: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

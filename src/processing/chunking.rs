//! Recursive character splitting.
//!
//! Documents are cut into chunks of at most `chunk_size` characters, preferring paragraph breaks,
//! then line breaks, then spaces, and only falling back to arbitrary character boundaries when
//! nothing coarser is available. Neighbouring chunks share up to `chunk_overlap` characters so
//! that spans around a boundary stay visible to retrieval.
//!
//! Lengths are counted in `char`s, not bytes. Separators stay attached to the start of the piece
//! that follows them, so pieces are re-joined without inserting anything.

use super::types::{Chunk, ChunkingError};
use std::collections::VecDeque;

/// Separators tried in order, coarsest first. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splitter that recursively narrows the separator until pieces fit the chunk size.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter using [`DEFAULT_SEPARATORS`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(ChunkingError::OverlapExceedsChunkSize {
                overlap: chunk_overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator preference list.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Split `text` into trimmed, non-empty chunks in document order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (position, &candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    /// Greedily pack small pieces into chunks, carrying a tail of at most `chunk_overlap`
    /// characters into the next chunk.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        length = total,
                        chunk_size = self.chunk_size,
                        "Created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    merged.extend(join_window(&window));
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(first) => total -= char_len(first),
                            None => break,
                        }
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        merged.extend(join_window(&window));
        merged
    }
}

/// Attach index and timestamp to split texts, preserving order.
pub(crate) fn build_chunks(texts: Vec<String>, upload_date: &str) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            chunk_index,
            upload_date: upload_date.to_string(),
        })
        .collect()
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on `separator`, keeping each occurrence at the start of the following piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        pieces.push(&text[start..position]);
        start = position;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

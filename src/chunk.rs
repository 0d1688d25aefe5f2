//! Fixed-width text chunker.
//!
//! Splits document text into contiguous windows of at most `chunk_size`
//! characters. There is no sentence or paragraph awareness: a window ends
//! exactly where the character budget runs out, and the final window may be
//! shorter. Sizes count Unicode scalar values, never bytes, so a window never
//! splits a multi-byte character.
//!
//! # Algorithm
//!
//! 1. Collect the byte offset of every character.
//! 2. Emit `text[offset(start)..offset(start + chunk_size)]`.
//! 3. Advance `start` by `chunk_size - overlap` (the whole window when
//!    `overlap` is zero) until the last character has been emitted.
//!
//! With `overlap == 0` concatenating the chunks reproduces the input exactly
//! and a text of `n` characters yields `ceil(n / chunk_size)` chunks.
//!
//! # Example
//!
//! ```rust
//! use context_recall::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefg", 3);
//! assert_eq!(chunks, vec!["abc", "def", "g"]);
//! ```

use crate::models::Chunk;

/// Chunk size used for document ingest unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// Split `text` into contiguous, non-overlapping windows.
///
/// Empty input yields an empty vector, never an error. A `chunk_size` of
/// zero disables splitting and returns the whole text as one chunk.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    chunk_with_overlap(text, chunk_size, 0)
}

/// Split `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one.
///
/// `overlap` is clamped below `chunk_size` so the window always advances.
pub fn chunk_with_overlap(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if chunk_size == 0 {
        return vec![text.to_string()];
    }

    let overlap = overlap.min(chunk_size - 1);
    let step = chunk_size - overlap;
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = offsets.len();

    let mut chunks = Vec::with_capacity(char_count.div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        let to = if end == char_count {
            text.len()
        } else {
            offsets[end]
        };
        chunks.push(text[offsets[start]..to].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    chunks
}

/// Chunk a document and tag every piece with `source`.
pub fn chunk_document(text: &str, source: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    chunk_with_overlap(text, chunk_size, overlap)
        .into_iter()
        .map(|content| Chunk::new(content, source))
        .collect()
}

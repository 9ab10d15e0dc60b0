//! Chunking utilities for splitting documents into overlapping segments.
//!
//! Each chunk is an exact slice of its source text. Consecutive chunks
//! share `overlap` characters, so a sentence cut at one boundary is still
//! whole in the neighbouring chunk. Boundaries are placed on paragraph
//! breaks, then sentence ends, then whitespace, and only as a last resort
//! in the middle of a word.

use serde::Serialize;

use crate::error::{Error, Result};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default overlap between chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Chunk size and overlap, both measured in characters.
///
/// # Examples
///
/// ```
/// use docqa::chunking::ChunkingConfig;
///
/// assert!(ChunkingConfig::default().validate().is_ok());
/// assert!(ChunkingConfig { chunk_size: 10, overlap: 10 }.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`] and [`chunk_pages`]. The index is the
/// chunk's position in document order and is what ranking ties are
/// broken on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the document.
    pub index: usize,
    /// Byte offset where this chunk starts in its source text.
    pub start_offset: usize,
    /// One-based page the chunk was cut from, when the source had pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl Chunk {
    /// A free-standing chunk with no source position beyond its index.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            index,
            start_offset: 0,
            page: None,
        }
    }
}

/// Split text into overlapping chunks.
///
/// Empty or whitespace-only text produces no chunks.
///
/// # Examples
///
/// ```
/// use docqa::chunking::chunk_text;
///
/// // Short text returns a single chunk
/// let chunks = chunk_text("Hello, world!", 1000, 0).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Hello, world!");
///
/// // Long text gets split
/// let text = "word ".repeat(500);
/// let chunks = chunk_text(&text, 1000, 200).unwrap();
/// assert!(chunks.len() >= 2);
///
/// // Nothing to split
/// assert!(chunk_text("  \n ", 1000, 200).unwrap().is_empty());
/// ```
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    ChunkingConfig {
        chunk_size,
        overlap,
    }
    .validate()?;

    let mut chunks = Vec::new();
    push_chunks(&mut chunks, text, chunk_size, overlap, None);
    Ok(chunks)
}

/// Split each page separately, numbering chunks continuously across pages.
///
/// Chunks never straddle a page boundary. Pages containing only
/// whitespace contribute nothing.
pub fn chunk_pages<S: AsRef<str>>(
    pages: &[S],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    ChunkingConfig {
        chunk_size,
        overlap,
    }
    .validate()?;

    let mut chunks = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        push_chunks(
            &mut chunks,
            page.as_ref(),
            chunk_size,
            overlap,
            Some(i + 1),
        );
    }
    Ok(chunks)
}

fn push_chunks(
    chunks: &mut Vec<Chunk>,
    text: &str,
    chunk_size: usize,
    overlap: usize,
    page: Option<usize>,
) {
    if text.trim().is_empty() {
        return;
    }

    let chars: Vec<char> = text.chars().collect();
    // Build a map of char index -> byte index for O(1) lookups
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    for (start_char, end_char) in chunk_spans(&chars, chunk_size, overlap) {
        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[end_char];
        chunks.push(Chunk {
            text: text[start_byte..end_byte].to_string(),
            index: chunks.len(),
            start_offset: start_byte,
            page,
        });
    }
}

/// Compute `[start, end)` char spans covering all of `chars`.
///
/// Every span except the last is longer than `overlap`, so the next span
/// (which starts `overlap` chars before the previous end) always moves
/// forward.
fn chunk_spans(
    chars: &[char],
    chunk_size: usize,
    overlap: usize,
) -> Vec<(usize, usize)> {
    let char_count = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let limit = (start + chunk_size).min(char_count);
        let end = if limit < char_count {
            let earliest = start + (overlap + 1).max(chunk_size / 2);
            find_break(chars, earliest.min(limit), limit)
        } else {
            limit
        };

        spans.push((start, end));
        if end >= char_count {
            break;
        }
        start = end - overlap;
    }

    spans
}

/// Find the best chunk end in `earliest..=limit`.
///
/// `limit` is always strictly inside the text, so `chars[end]` exists for
/// every candidate.
fn find_break(chars: &[char], earliest: usize, limit: usize) -> usize {
    let candidates = || (earliest.max(1)..=limit).rev();

    let paragraph = candidates().find(|&end| {
        end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n'
    });
    if let Some(end) = paragraph {
        return end;
    }

    let sentence = candidates().find(|&end| {
        let prev = chars[end - 1];
        prev == '\n'
            || (matches!(prev, '.' | '!' | '?') && chars[end].is_whitespace())
    });
    if let Some(end) = sentence {
        return end;
    }

    let word = candidates().find(|&end| chars[end - 1].is_whitespace());
    word.unwrap_or(limit)
}

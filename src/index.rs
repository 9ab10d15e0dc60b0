//! The similarity index abstraction shared by lexical and dense search.
//!
//! An index owns the chunks of exactly one document and one vector per
//! chunk. The vector space is fixed when the index is built; there is no
//! way to add chunks afterwards, a new document needs a new index.

use serde::Serialize;

use crate::{
    chunking::Chunk,
    config::RetrievalMode,
    error::{Error, Result},
};

/// Number of chunks returned when the caller does not say otherwise.
pub const DEFAULT_SEARCH_K: usize = 3;

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity, higher is more similar.
    pub score: f32,
}

/// A searchable vector space over one document's chunks.
///
/// Implementations must be deterministic: the same chunks and the same
/// query always produce the same ordered results.
pub trait SimilarityIndex: Send + Sync {
    /// Rank every chunk against `query` and return the best `k`.
    ///
    /// Results are sorted by descending score with ties broken by chunk
    /// position. If `k` exceeds the corpus size every chunk is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyCorpus`] if the index holds no chunks
    /// - [`Error::Config`] if `k == 0`
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// All indexed chunks in document order.
    fn chunks(&self) -> &[Chunk];

    /// Which vector space this index searches in.
    fn mode(&self) -> RetrievalMode;

    fn len(&self) -> usize {
        self.chunks().len()
    }

    fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }
}

/// Reject searches that cannot produce a meaningful ranking.
pub(crate) fn check_search(corpus_len: usize, k: usize) -> Result<()> {
    if corpus_len == 0 {
        return Err(Error::EmptyCorpus);
    }
    if k == 0 {
        return Err(Error::Config("k must be greater than zero".to_string()));
    }
    Ok(())
}

/// Sort chunks by score (descending, ties by position) and keep `k`.
///
/// `scores[i]` belongs to `chunks[i]`.
pub(crate) fn rank(
    chunks: &[Chunk],
    scores: &[f32],
    k: usize,
) -> Vec<ScoredChunk> {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| chunks[a].index.cmp(&chunks[b].index))
    });

    order
        .into_iter()
        .take(k)
        .map(|i| ScoredChunk {
            chunk: chunks[i].clone(),
            score: scores[i],
        })
        .collect()
}

/// Compute cosine similarity between two dense vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

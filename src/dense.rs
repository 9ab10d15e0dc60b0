//! Nearest-neighbour search over dense chunk embeddings.
//!
//! Unlike the lexical index, a dense index can match a question to a
//! passage that shares no words with it. Search is exhaustive: every
//! chunk is compared to the query, which is fine at the size of a single
//! study document.

use std::sync::Arc;

use crate::{
    chunking::Chunk,
    config::RetrievalMode,
    embedding::Embedder,
    error::{Error, Result},
    index::{self, ScoredChunk, SimilarityIndex, cosine_similarity},
};

pub struct DenseIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

impl DenseIndex {
    /// Embed every chunk with `embedder`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyCorpus`] if `chunks` is empty
    /// - [`Error::Model`] if the embedder fails or returns the wrong
    ///   number of vectors
    pub fn build(chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_documents(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(Error::Model(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        tracing::debug!(
            chunks = chunks.len(),
            model = embedder.name(),
            dimensions = vectors.first().map_or(0, Vec::len),
            "built dense index"
        );

        Ok(Self {
            chunks,
            vectors,
            embedder,
        })
    }
}

impl std::fmt::Debug for DenseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseIndex")
            .field("chunks", &self.chunks.len())
            .field("model", &self.embedder.name())
            .finish()
    }
}

impl SimilarityIndex for DenseIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        index::check_search(self.chunks.len(), k)?;

        let query_vector = self.embedder.embed_query(query)?;
        let scores: Vec<f32> = self
            .vectors
            .iter()
            .map(|v| cosine_similarity(&query_vector, v))
            .collect();

        Ok(index::rank(&self.chunks, &scores, k))
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Dense
    }
}

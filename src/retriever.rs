//! A top-K handle over one similarity index.

use crate::{
    chunking::Chunk,
    error::{Error, Result},
    index::{ScoredChunk, SimilarityIndex},
};

/// Binds one index to one `top_k`.
///
/// Callers only see chunks; whether they came from the lexical or the
/// dense index is decided when the retriever is built.
///
/// # Examples
///
/// ```
/// use docqa::chunking::Chunk;
/// use docqa::lexical::LexicalIndex;
/// use docqa::retriever::Retriever;
///
/// let index = LexicalIndex::build(vec![
///     Chunk::new(0, "Osmosis moves water across membranes."),
///     Chunk::new(1, "Enzymes speed up reactions."),
/// ])
/// .unwrap();
/// let retriever = Retriever::new(Box::new(index), 1).unwrap();
///
/// let chunks = retriever.retrieve("what do enzymes do").unwrap();
/// assert_eq!(chunks[0].text, "Enzymes speed up reactions.");
/// ```
pub struct Retriever {
    index: Box<dyn SimilarityIndex>,
    top_k: usize,
}

impl Retriever {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `top_k` is zero.
    pub fn new(index: Box<dyn SimilarityIndex>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        Ok(Self { index, top_k })
    }

    /// The best `top_k` chunks for `query`, most similar first.
    pub fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_scored(query)?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve), keeping the similarity scores.
    pub fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        self.index.search(query, self.top_k)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &dyn SimilarityIndex {
        self.index.as_ref()
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("mode", &self.index.mode())
            .field("chunks", &self.index.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

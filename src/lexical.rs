//! TF-IDF vector space over a document's chunks.
//!
//! Tokens come from a tantivy [`TextAnalyzer`]: split on non-alphanumeric
//! characters, drop over-long tokens, lower-case, then drop English stop
//! words. Single-character tokens are ignored as well.
//!
//! Weights are raw term counts times the smoothed inverse document
//! frequency `ln((1 + n) / (1 + df)) + 1`, and every vector is scaled to
//! unit length, so the dot product of two vectors is their cosine.
//!
//! All weights are non-negative, so scores fall in `[0, 1]`. A score of
//! zero means the query shares no vocabulary with the chunk. It does not
//! mean the chunk is unrelated: "car" and "automobile" never match here.
//! Use the dense index when that matters.

use std::collections::{BTreeSet, HashMap};

use tantivy::tokenizer::{
    LowerCaser,
    RemoveLongFilter,
    SimpleTokenizer,
    StopWordFilter,
    TextAnalyzer,
    TokenStream,
};

use crate::{
    chunking::Chunk,
    config::RetrievalMode,
    error::{Error, Result},
    index::{self, ScoredChunk, SimilarityIndex},
};

/// Tokens longer than this (in bytes) are dropped before indexing.
const MAX_TOKEN_LEN: usize = 40;

/// Tokens shorter than this (in characters) carry no meaning on their own.
const MIN_TOKEN_CHARS: usize = 2;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am",
    "an", "and", "any", "are", "as", "at", "be", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "down", "during", "each", "either", "else", "etc",
    "ever", "every", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his",
    "how", "however", "i", "if", "in", "into", "is", "it", "its", "itself",
    "just", "may", "me", "might", "more", "most", "must", "my", "myself",
    "neither", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
    "shall", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "upon",
    "us", "very", "was", "we", "were", "what", "when", "where", "whether",
    "which", "while", "who", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// A sparse vector: `(term id, weight)` pairs sorted by term id.
type SparseVector = Vec<(u32, f32)>;

fn build_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(
            ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()),
        ))
        .build()
}

fn tokenize(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        let token = &stream.token().text;
        if token.chars().count() >= MIN_TOKEN_CHARS {
            tokens.push(token.clone());
        }
    }
    tokens
}

/// TF-IDF index with cosine ranking.
///
/// # Examples
///
/// ```
/// use docqa::chunking::Chunk;
/// use docqa::index::SimilarityIndex;
/// use docqa::lexical::LexicalIndex;
///
/// let index = LexicalIndex::build(vec![
///     Chunk::new(0, "Plants convert light into sugar."),
///     Chunk::new(1, "Mitochondria produce ATP."),
/// ])
/// .unwrap();
///
/// let hits = index.search("who produces ATP", 1).unwrap();
/// assert_eq!(hits[0].chunk.index, 1);
/// ```
pub struct LexicalIndex {
    chunks: Vec<Chunk>,
    analyzer: TextAnalyzer,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
    vectors: Vec<SparseVector>,
}

impl LexicalIndex {
    /// Fit the vocabulary and IDF weights on `chunks` and vectorize them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCorpus`] if `chunks` is empty.
    pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let analyzer = build_analyzer();
        let tokenized: Vec<Vec<String>> = chunks
            .iter()
            .map(|chunk| tokenize(&analyzer, &chunk.text))
            .collect();

        // Term ids follow lexicographic order so the same corpus always
        // produces the same vector layout.
        let terms: BTreeSet<&str> = tokenized
            .iter()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();
        let vocabulary: HashMap<String, u32> = terms
            .iter()
            .enumerate()
            .map(|(id, term)| (term.to_string(), id as u32))
            .collect();

        let mut document_frequency = vec![0u32; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<u32> =
                tokens.iter().map(|t| vocabulary[t.as_str()]).collect();
            for id in unique {
                document_frequency[id as usize] += 1;
            }
        }

        let n = chunks.len() as f32;
        let idf: Vec<f32> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let vectors: Vec<SparseVector> = tokenized
            .iter()
            .map(|tokens| {
                weigh(tokens.iter().filter_map(|t| vocabulary.get(t)), &idf)
            })
            .collect();

        tracing::debug!(
            chunks = chunks.len(),
            vocabulary = vocabulary.len(),
            "built lexical index"
        );

        Ok(Self {
            chunks,
            analyzer,
            vocabulary,
            idf,
            vectors,
        })
    }

    /// Number of distinct terms seen while fitting.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Project text into the fitted space. Unknown terms are ignored.
    fn vectorize(&self, text: &str) -> SparseVector {
        let tokens = tokenize(&self.analyzer, text);
        weigh(
            tokens.iter().filter_map(|t| self.vocabulary.get(t)),
            &self.idf,
        )
    }
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex")
            .field("chunks", &self.chunks.len())
            .field("vocabulary", &self.vocabulary.len())
            .finish()
    }
}

impl SimilarityIndex for LexicalIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        index::check_search(self.chunks.len(), k)?;

        let query_vector = self.vectorize(query);
        let scores: Vec<f32> = self
            .vectors
            .iter()
            .map(|v| sparse_dot(&query_vector, v))
            .collect();

        Ok(index::rank(&self.chunks, &scores, k))
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Lexical
    }
}

/// Count term ids, apply IDF, and scale to unit length.
fn weigh<'a>(ids: impl Iterator<Item = &'a u32>, idf: &[f32]) -> SparseVector {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for &id in ids {
        *counts.entry(id).or_default() += 1;
    }

    let mut vector: SparseVector = counts
        .into_iter()
        .map(|(id, tf)| (id, tf as f32 * idf[id as usize]))
        .collect();
    vector.sort_unstable_by_key(|&(id, _)| id);

    let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut vector {
            *w /= norm;
        }
    }
    vector
}

/// Dot product of two sparse vectors sorted by term id.
fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn corpus(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(i, *t))
            .collect()
    }

    fn biology() -> LexicalIndex {
        LexicalIndex::build(corpus(&[
            "The mitochondria is the powerhouse of the cell.",
            "It produces ATP through cellular respiration.",
            "Photosynthesis happens in the chloroplast of plant cells.",
            "The nucleus stores genetic material such as DNA.",
        ]))
        .unwrap()
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(
            LexicalIndex::build(Vec::new()).unwrap_err(),
            Error::EmptyCorpus
        ));
    }

    #[test]
    fn best_match_ranks_first() {
        let index = biology();
        let hits = index.search("what produces ATP", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.index, 1);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn k_larger_than_corpus_returns_everything() {
        let index = biology();
        let hits = index.search("chloroplast", 50).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk.index, 2);

        let mut positions: Vec<usize> =
            hits.iter().map(|h| h.chunk.index).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_k_is_a_config_error() {
        assert!(matches!(
            biology().search("cell", 0).unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn no_overlap_scores_zero_and_keeps_document_order() {
        let index = biology();
        let hits = index.search("quantum chromodynamics", 3).unwrap();
        assert!(hits.iter().all(|h| h.score == 0.0));
        let positions: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn stop_words_and_case_are_ignored() {
        let index = biology();
        let a = index.search("THE NUCLEUS", 4).unwrap();
        let b = index.search("nucleus", 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].chunk.index, 3);
    }

    #[test]
    fn scores_are_bounded() {
        let index = biology();
        for hit in index.search("cell cells mitochondria ATP DNA", 4).unwrap() {
            assert!((0.0..=1.0 + 1e-6).contains(&hit.score));
        }
    }

    #[test]
    fn identical_text_scores_one() {
        let index = biology();
        let hits = index
            .search("The nucleus stores genetic material such as DNA.", 1)
            .unwrap();
        assert_eq!(hits[0].chunk.index, 3);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn vocabulary_skips_stop_words_and_single_chars() {
        let index = LexicalIndex::build(corpus(&["a b the cat is on x mat"]))
            .unwrap();
        assert_eq!(index.vocabulary_size(), 2);
        assert_eq!(index.mode(), RetrievalMode::Lexical);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn sparse_dot_merges_sorted_ids() {
        let a = vec![(1, 0.5), (3, 0.5), (7, 1.0)];
        let b = vec![(0, 1.0), (3, 2.0), (7, 0.5)];
        assert!((sparse_dot(&a, &b) - 1.5).abs() < 1e-6);
        assert_eq!(sparse_dot(&a, &[]), 0.0);
    }

    proptest! {
        #[test]
        fn search_is_deterministic(
            texts in proptest::collection::vec("[a-z ]{0,60}", 1..12),
            query in "[a-z ]{0,30}",
            k in 1usize..15,
        ) {
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| Chunk::new(i, t.clone()))
                .collect();

            let first = LexicalIndex::build(chunks.clone()).unwrap();
            let second = LexicalIndex::build(chunks).unwrap();

            let a = first.search(&query, k).unwrap();
            let b = first.search(&query, k).unwrap();
            let c = second.search(&query, k).unwrap();

            prop_assert_eq!(a.len(), k.min(texts.len()));
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
            for pair in a.windows(2) {
                prop_assert!(
                    pair[0].score > pair[1].score
                        || (pair[0].score == pair[1].score
                            && pair[0].chunk.index < pair[1].chunk.index)
                );
            }
        }
    }
}

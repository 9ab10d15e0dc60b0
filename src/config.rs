//! Runtime configuration for indexing and answering.
//!
//! Every field has a default, so a config file only needs to mention
//! what it changes:
//!
//! ```
//! use docqa::config::{QaConfig, RetrievalMode};
//!
//! let config: QaConfig =
//!     serde_json::from_str(r#"{"top_k": 5, "retrieval_mode": "dense"}"#)
//!         .unwrap();
//! assert_eq!(config.top_k, 5);
//! assert_eq!(config.retrieval_mode, RetrievalMode::Dense);
//! assert_eq!(config.chunk_size, docqa::chunking::DEFAULT_CHUNK_SIZE);
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    error::{Error, Result},
};

/// Chunks retrieved per sub-question.
pub const DEFAULT_TOP_K: usize = 3;

/// How long a single generator call may take.
pub const DEFAULT_GENERATOR_TIMEOUT_MS: u64 = 30_000;

/// Retrieved chunks the extractive strategy reads sentences from.
pub const DEFAULT_CONTEXT_CHUNKS: usize = 2;

/// Sentences shorter than this (in characters) are too fragment-like
/// to be an answer.
pub const DEFAULT_MIN_SENTENCE_CHARS: usize = 20;

/// Generated answers with fewer words than this count as degenerate.
pub const DEFAULT_MIN_ANSWER_WORDS: usize = 6;

/// Which vector space the index is built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// TF-IDF over the chunk corpus.
    #[default]
    Lexical,
    /// Sentence embeddings from a pretrained model.
    Dense,
}

/// How answers are produced from retrieved chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Pick the best-matching sentence, no model involved.
    #[default]
    Extractive,
    /// Ask an external text generator, falling back when it misbehaves.
    Generative,
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalMode::Lexical => f.write_str("lexical"),
            RetrievalMode::Dense => f.write_str("dense"),
        }
    }
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerMode::Extractive => f.write_str("extractive"),
            AnswerMode::Generative => f.write_str("generative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per sub-question.
    pub top_k: usize,
    pub retrieval_mode: RetrievalMode,
    pub answer_mode: AnswerMode,
    /// Maximum wait for one external generator call, in milliseconds.
    pub generator_timeout_ms: u64,
    pub context_chunks: usize,
    pub min_sentence_chars: usize,
    pub min_answer_words: usize,
    /// Dense embedding model ID or local path. Falls back to
    /// `DOCQA_MODEL`, then the built-in default.
    pub model: Option<String>,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            retrieval_mode: RetrievalMode::default(),
            answer_mode: AnswerMode::default(),
            generator_timeout_ms: DEFAULT_GENERATOR_TIMEOUT_MS,
            context_chunks: DEFAULT_CONTEXT_CHUNKS,
            min_sentence_chars: DEFAULT_MIN_SENTENCE_CHARS,
            min_answer_words: DEFAULT_MIN_ANSWER_WORDS,
            model: None,
        }
    }
}

impl QaConfig {
    pub fn builder() -> QaConfigBuilder {
        QaConfigBuilder::default()
    }

    /// Load a JSON config file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        let config: QaConfig = serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "invalid config file {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `context_chunks == 0`
    /// - `generator_timeout_ms == 0`
    pub fn validate(&self) -> Result<()> {
        self.chunking().validate()?;
        if self.top_k == 0 {
            return Err(Error::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.context_chunks == 0 {
            return Err(Error::Config(
                "context_chunks must be greater than zero".to_string(),
            ));
        }
        if self.generator_timeout_ms == 0 {
            return Err(Error::Config(
                "generator_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms)
    }
}

/// Builder for a validated [`QaConfig`].
#[derive(Debug, Clone, Default)]
pub struct QaConfigBuilder {
    config: QaConfig,
}

impl QaConfigBuilder {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn retrieval_mode(mut self, mode: RetrievalMode) -> Self {
        self.config.retrieval_mode = mode;
        self
    }

    pub fn answer_mode(mut self, mode: AnswerMode) -> Self {
        self.config.answer_mode = mode;
        self
    }

    pub fn generator_timeout_ms(mut self, ms: u64) -> Self {
        self.config.generator_timeout_ms = ms;
        self
    }

    pub fn context_chunks(mut self, n: usize) -> Self {
        self.config.context_chunks = n;
        self
    }

    pub fn min_sentence_chars(mut self, n: usize) -> Self {
        self.config.min_sentence_chars = n;
        self
    }

    pub fn min_answer_words(mut self, n: usize) -> Self {
        self.config.min_answer_words = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn build(self) -> Result<QaConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

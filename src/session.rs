//! The caller-owned context that ties the pipeline together.
//!
//! A [`Session`] holds at most one indexed document. Loading a new one
//! replaces the old index; a failed load leaves the session empty rather
//! than half-built. Questions run strictly in order:
//!
//! 1. split the raw input into sub-questions
//! 2. retrieve the top chunks for each
//! 3. synthesize an answer from those chunks
//! 4. format the answers into one result

use std::{path::Path, sync::Arc};

use crate::{
    chunking::{self, Chunk},
    config::{AnswerMode, QaConfig, RetrievalMode},
    dense::DenseIndex,
    embedding::{ColbertEmbedder, Embedder},
    error::{Error, Result},
    format::{Answer, FormatStyle, Formatter},
    index::SimilarityIndex,
    lexical::LexicalIndex,
    loader::{self, LoadedDocument},
    model_manager::resolve_model_id,
    question::split_questions,
    retriever::Retriever,
    synthesis::{
        ExtractiveSynthesizer,
        GenerativeSynthesizer,
        Synthesizer,
        TextGenerator,
    },
};

pub struct Session {
    config: QaConfig,
    synthesizer: Box<dyn Synthesizer>,
    embedder: Option<Arc<dyn Embedder>>,
    formatter: Formatter,
    document: Option<IndexedDocument>,
}

struct IndexedDocument {
    name: String,
    retriever: Retriever,
}

/// Collaborators a [`Session`] may need, depending on its configuration.
#[derive(Default)]
pub struct SessionBuilder {
    config: QaConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    embedder: Option<Arc<dyn Embedder>>,
    style: FormatStyle,
}

impl SessionBuilder {
    pub fn config(mut self, config: QaConfig) -> Self {
        self.config = config;
        self
    }

    /// Required when the answer mode is generative.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Overrides the ColBERT embedder used in dense mode.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn style(mut self, style: FormatStyle) -> Self {
        self.style = style;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the
    /// answer mode is generative and no generator was given.
    pub fn build(self) -> Result<Session> {
        let config = self.config;
        config.validate()?;

        let synthesizer: Box<dyn Synthesizer> = match config.answer_mode {
            AnswerMode::Extractive => {
                Box::new(ExtractiveSynthesizer::from_config(&config))
            }
            AnswerMode::Generative => {
                let generator = self.generator.ok_or_else(|| {
                    Error::Config(
                        "generative answers need a text generator".to_string(),
                    )
                })?;
                Box::new(GenerativeSynthesizer::from_config(&config, generator)?)
            }
        };

        let embedder = match config.retrieval_mode {
            RetrievalMode::Lexical => None,
            RetrievalMode::Dense => Some(self.embedder.unwrap_or_else(|| {
                let model_id = resolve_model_id(config.model.as_deref());
                Arc::new(ColbertEmbedder::new(model_id)) as Arc<dyn Embedder>
            })),
        };

        Ok(Session {
            config,
            synthesizer,
            embedder,
            formatter: Formatter::new(self.style),
            document: None,
        })
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// An extractive session over the given configuration.
    pub fn new(config: QaConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Name of the loaded document, if any.
    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.name.as_str())
    }

    /// Chunks of the loaded document, in document order.
    pub fn chunks(&self) -> &[Chunk] {
        self.document
            .as_ref()
            .map(|d| d.retriever.index().chunks())
            .unwrap_or_default()
    }

    /// Forget the loaded document.
    pub fn clear(&mut self) {
        self.document = None;
    }

    /// Parse, chunk and index a document, replacing any previous one.
    ///
    /// Returns the number of chunks indexed.
    ///
    /// # Errors
    ///
    /// - [`Error::DocumentParse`] if the bytes cannot be read as a document
    /// - [`Error::EmptyCorpus`] if the document has no text
    /// - [`Error::Model`] if the dense embedder fails
    pub fn load_document(&mut self, name: &str, bytes: &[u8]) -> Result<usize> {
        self.document = None;
        let document = loader::load_bytes(name, bytes)?;
        self.index_document(document)
    }

    /// Like [`load_document`](Self::load_document), reading from disk.
    pub fn load_path(&mut self, path: &Path) -> Result<usize> {
        self.document = None;
        let document = loader::load_path(path)?;
        self.index_document(document)
    }

    fn index_document(&mut self, document: LoadedDocument) -> Result<usize> {
        let chunks = chunking::chunk_pages(
            &document.pages,
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;
        let count = chunks.len();

        let index: Box<dyn SimilarityIndex> = match &self.embedder {
            None => Box::new(LexicalIndex::build(chunks)?),
            Some(embedder) => {
                Box::new(DenseIndex::build(chunks, Arc::clone(embedder))?)
            }
        };
        let retriever = Retriever::new(index, self.config.top_k)?;

        tracing::info!(
            document = %document.name,
            pages = document.pages.len(),
            chunks = count,
            mode = %self.config.retrieval_mode,
            "indexed document"
        );
        self.document = Some(IndexedDocument {
            name: document.name,
            retriever,
        });
        Ok(count)
    }

    /// Answer every sub-question in `raw`, in the order asked.
    ///
    /// # Errors
    ///
    /// - [`Error::NoDocument`] if no document is loaded
    /// - [`Error::EmptyQuestion`] if `raw` contains no question text
    /// - [`Error::EmptyCorpus`] or [`Error::Model`] from retrieval
    pub fn ask(&self, raw: &str) -> Result<Vec<Answer>> {
        let document = self.document.as_ref().ok_or(Error::NoDocument)?;

        let questions = split_questions(raw);
        if questions.is_empty() {
            return Err(Error::EmptyQuestion);
        }

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let chunks = document.retriever.retrieve(&question)?;
            let (text, mode) = self.synthesizer.synthesize(&chunks, &question);
            tracing::debug!(question = %question, retrieved = chunks.len(), %mode, "answered");
            answers.push(Answer::new(question, text, mode));
        }

        tracing::info!(
            document = %document.name,
            questions = answers.len(),
            "answered input"
        );
        Ok(answers)
    }

    /// [`ask`](Self::ask), rendered as one composite result headed by the
    /// document name.
    pub fn ask_formatted(&self, raw: &str) -> Result<String> {
        let answers = self.ask(raw)?;
        Ok(self.render(&answers))
    }

    /// Format answers under a header naming the loaded document.
    pub fn render(&self, answers: &[Answer]) -> String {
        let name = self.document_name().unwrap_or_default();
        format!(
            "{}{}",
            self.formatter.header(name),
            self.formatter.join(answers)
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("answer_mode", &self.synthesizer.mode())
            .field("document", &self.document_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::tests::TopicEmbedder;

    const NOTES: &str = "The mitochondria is the powerhouse of the cell. \
        It produces ATP through respiration.\n\n\
        Chloroplasts capture light energy and turn it into sugar. \
        This process is called photosynthesis.\n\n\
        The nucleus is where DNA is stored in the cell.";

    fn small_config() -> QaConfig {
        QaConfig::builder()
            .chunk_size(120)
            .chunk_overlap(10)
            .top_k(2)
            .build()
            .unwrap()
    }

    fn loaded(config: QaConfig) -> Session {
        let mut session = Session::new(config).unwrap();
        session.load_document("notes.txt", NOTES.as_bytes()).unwrap();
        session
    }

    #[test]
    fn asking_without_document_fails() {
        let session = Session::new(QaConfig::default()).unwrap();
        assert!(matches!(session.ask("what is ATP").unwrap_err(), Error::NoDocument));
    }

    #[test]
    fn blank_question_fails() {
        let session = loaded(small_config());
        assert!(matches!(session.ask("  ?? and ").unwrap_err(), Error::EmptyQuestion));
    }

    #[test]
    fn compound_question_is_answered_in_order() {
        let session = loaded(small_config());
        let answers = session
            .ask("what produces ATP and where is DNA stored?")
            .unwrap();

        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question, "what produces ATP");
        assert_eq!(answers[0].text, "It produces ATP through respiration.");
        assert_eq!(answers[1].question, "where is DNA stored");
        assert_eq!(answers[1].text, "The nucleus is where DNA is stored in the cell.");
        assert!(answers.iter().all(|a| a.mode == AnswerMode::Extractive));
    }

    #[test]
    fn formatted_result_names_document() {
        let session = loaded(small_config());
        let out = session.ask_formatted("what produces ATP").unwrap();
        assert!(out.starts_with("Answer from PDF: notes.txt\n"));
        assert!(out.contains("Q: What produces ATP"));
        assert!(out.contains("It produces ATP through respiration."));
    }

    #[test]
    fn blank_document_is_empty_corpus_and_clears_session() {
        let mut session = loaded(small_config());
        assert!(session.document_name().is_some());

        let err = session.load_document("blank.txt", b"   \n ").unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
        assert!(session.document_name().is_none());
        assert!(session.chunks().is_empty());
    }

    #[test]
    fn parse_failure_leaves_no_index() {
        let mut session = loaded(small_config());
        let err = session.load_document("bad.txt", &[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, Error::DocumentParse { .. }));
        assert!(matches!(session.ask("ATP").unwrap_err(), Error::NoDocument));
    }

    #[test]
    fn new_document_replaces_old() {
        let mut session = loaded(small_config());
        session
            .load_document("physics.txt", b"Gravity pulls masses toward each other.")
            .unwrap();
        assert_eq!(session.document_name(), Some("physics.txt"));
        assert_eq!(session.chunks().len(), 1);
    }

    #[test]
    fn generative_mode_requires_generator() {
        let config = QaConfig::builder()
            .answer_mode(AnswerMode::Generative)
            .build()
            .unwrap();
        assert!(matches!(Session::new(config).unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn generative_mode_uses_generator() {
        let config = QaConfig::builder()
            .chunk_size(120)
            .chunk_overlap(10)
            .answer_mode(AnswerMode::Generative)
            .build()
            .unwrap();
        let generator = |prompt: &str| -> Result<String> {
            assert!(prompt.contains("Context:"));
            Ok("ATP is made by mitochondria during cellular respiration.".to_string())
        };
        let mut session = Session::builder()
            .config(config)
            .generator(Arc::new(generator))
            .build()
            .unwrap();
        session.load_document("notes.txt", NOTES.as_bytes()).unwrap();

        let answers = session.ask("what produces ATP").unwrap();
        assert_eq!(answers[0].mode, AnswerMode::Generative);
        assert!(answers[0].text.starts_with("ATP is made"));
    }

    #[test]
    fn fallback_answers_carry_no_generated_note() {
        let config = QaConfig::builder()
            .chunk_size(120)
            .chunk_overlap(10)
            .answer_mode(AnswerMode::Generative)
            .build()
            .unwrap();
        let generator = |_: &str| -> Result<String> {
            Err(Error::Generation("model offline".to_string()))
        };
        let mut session = Session::builder()
            .config(config)
            .generator(Arc::new(generator))
            .build()
            .unwrap();
        session.load_document("notes.txt", NOTES.as_bytes()).unwrap();

        let answers = session.ask("what produces ATP").unwrap();
        assert_eq!(answers[0].mode, AnswerMode::Extractive);
        assert_eq!(answers[0].text, "It produces ATP through respiration.");

        let out = session.render(&answers);
        assert!(!out.contains(crate::format::GENERATED_NOTE));
    }

    #[test]
    fn dense_mode_uses_embedder() {
        let config = QaConfig::builder()
            .chunk_size(120)
            .chunk_overlap(10)
            .top_k(1)
            .retrieval_mode(RetrievalMode::Dense)
            .build()
            .unwrap();
        let mut session = Session::builder()
            .config(config)
            .embedder(Arc::new(TopicEmbedder))
            .build()
            .unwrap();
        session.load_document("notes.txt", NOTES.as_bytes()).unwrap();

        let answers = session.ask("how do plants make sugar from light").unwrap();
        assert!(answers[0].text.starts_with("Chloroplasts capture light"));
    }
}

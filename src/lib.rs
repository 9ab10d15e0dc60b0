//! docqa - answer questions about a study document from its own text.
//!
//! A document is split into overlapping chunks and indexed, either
//! lexically with TF-IDF or densely with sentence embeddings. Each
//! sub-question of the user's input retrieves the most similar chunks,
//! and an answer is either extracted from them (the best-matching
//! sentence) or written by an external text generator grounded on them.
//!
//! # Quick start
//!
//! ```
//! use docqa::{QaConfig, Session};
//!
//! let mut session = Session::new(QaConfig::default()).unwrap();
//! session
//!     .load_document(
//!         "biology.txt",
//!         b"The mitochondria is the powerhouse of the cell. \
//!           It produces ATP through respiration.",
//!     )
//!     .unwrap();
//!
//! let answers = session.ask("what produces ATP?").unwrap();
//! assert_eq!(answers[0].text, "It produces ATP through respiration.");
//! ```

pub mod chunking;
pub mod config;
pub mod dense;
pub mod embedding;
pub mod error;
pub mod format;
pub mod index;
pub mod lexical;
pub mod loader;
pub mod model_manager;
pub mod question;
pub mod retriever;
pub mod session;
pub mod synthesis;
pub mod text_util;

pub use chunking::Chunk;
pub use config::{AnswerMode, QaConfig, RetrievalMode};
pub use error::{Error, Result};
pub use format::{Answer, FormatStyle, Formatter};
pub use index::{ScoredChunk, SimilarityIndex};
pub use retriever::Retriever;
pub use session::Session;
pub use synthesis::TextGenerator;

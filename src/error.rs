pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not parse document '{name}': {message}")]
    DocumentParse { name: String, message: String },

    #[error("no content to index: the corpus has zero chunks")]
    EmptyCorpus,

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("no document has been loaded")]
    NoDocument,

    #[error("the input contains no question")]
    EmptyQuestion,
}

impl Error {
    /// A fixed, plain sentence suitable for showing to an end user.
    ///
    /// The detailed `Display` output is meant for logs; this never leaks
    /// internal error descriptions.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Io(_) => "The document could not be read.",
            Error::Json(_) => "The result could not be written as JSON.",
            Error::Config(_) => {
                "The settings are invalid. Check the command-line options and config file."
            }
            Error::DocumentParse { .. } => {
                "The document could not be parsed. Is it a valid PDF or text file?"
            }
            Error::EmptyCorpus => "The document has no text that can be searched.",
            Error::Generation(_) => "An answer could not be generated.",
            Error::Model(_) => "The embedding model could not be used.",
            Error::NoDocument => "Please upload a document first!",
            Error::EmptyQuestion => "Please enter a question!",
        }
    }
}

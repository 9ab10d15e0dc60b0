use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use docqa::config::{AnswerMode, RetrievalMode};

#[derive(Debug, Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about a study document, answered from its own text"
)]
pub struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// How chunks are indexed and searched
    #[arg(long, value_enum, global = true)]
    pub retrieval: Option<RetrievalArg>,

    /// How answers are produced from retrieved chunks
    #[arg(long, value_enum, global = true)]
    pub answer_mode: Option<AnswerModeArg>,

    /// Program that reads a prompt on stdin and writes an answer to
    /// stdout (e.g. "ollama run llama3"); needed for generative answers
    #[arg(long, global = true)]
    pub generator_cmd: Option<String>,

    /// Chunks retrieved per question
    #[arg(short = 'k', long, global = true)]
    pub top_k: Option<usize>,

    /// Maximum characters per chunk
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true)]
    pub chunk_overlap: Option<usize>,

    /// Override the dense embedding model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Render answers as HTML blocks
    #[arg(long, global = true, conflicts_with = "json")]
    pub html: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a document and answer one question
    Ask(AskArgs),
    /// Index a document and answer questions read from stdin, one per line
    Chat(ChatArgs),
    /// Show how a document is split into chunks
    Chunks(ChunksArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetrievalArg {
    Lexical,
    Dense,
}

impl From<RetrievalArg> for RetrievalMode {
    fn from(arg: RetrievalArg) -> Self {
        match arg {
            RetrievalArg::Lexical => RetrievalMode::Lexical,
            RetrievalArg::Dense => RetrievalMode::Dense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnswerModeArg {
    Extractive,
    Generative,
}

impl From<AnswerModeArg> for AnswerMode {
    fn from(arg: AnswerModeArg) -> Self {
        match arg {
            AnswerModeArg::Extractive => AnswerMode::Extractive,
            AnswerModeArg::Generative => AnswerMode::Generative,
        }
    }
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// PDF, text or markdown file
    pub document: PathBuf,

    /// The question; several words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
}

impl AskArgs {
    pub fn question_text(&self) -> String {
        self.question.join(" ")
    }
}

// -- Chat --

#[derive(Debug, Parser)]
pub struct ChatArgs {
    /// PDF, text or markdown file
    pub document: PathBuf,
}

// -- Chunks --

#[derive(Debug, Parser)]
pub struct ChunksArgs {
    /// PDF, text or markdown file
    pub document: PathBuf,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docqa",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_ask_joins_question_words() {
        let cli = Cli::parse_from([
            "docqa", "ask", "notes.pdf", "what", "is", "ATP?",
        ]);
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.document, PathBuf::from("notes.pdf"));
                assert_eq!(args.question_text(), "what is ATP?");
            }
            _ => panic!("expected ask command"),
        }
        assert!(!cli.html);
        assert!(!cli.json);
        assert_eq!(cli.top_k, None);
    }

    #[test]
    fn parse_global_overrides() {
        let cli = Cli::parse_from([
            "docqa",
            "chat",
            "notes.txt",
            "--retrieval",
            "dense",
            "--answer-mode",
            "generative",
            "--generator-cmd",
            "ollama run llama3",
            "-k",
            "5",
            "-vv",
        ]);
        assert_eq!(cli.retrieval, Some(RetrievalArg::Dense));
        assert_eq!(cli.answer_mode, Some(AnswerModeArg::Generative));
        assert_eq!(cli.generator_cmd.as_deref(), Some("ollama run llama3"));
        assert_eq!(cli.top_k, Some(5));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Chat(_)));
    }

    #[test]
    fn html_and_json_conflict() {
        let result = Cli::try_parse_from([
            "docqa", "--html", "--json", "chunks", "notes.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["docqa", "ask", "notes.txt"]).is_err());
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}

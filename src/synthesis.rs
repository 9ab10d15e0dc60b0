//! Turning retrieved chunks into an answer for one sub-question.
//!
//! Two strategies share the [`Synthesizer`] trait. The extractive one
//! picks the sentence with the most words in common with the question.
//! The generative one asks an external [`TextGenerator`] and repairs bad
//! results locally: a failed, timed-out, too-short or evasive answer is
//! retried once with a plain prompt, and if that also fails the
//! extractive answer is used. Generation problems never reach the caller,
//! and every answer reports the strategy that actually wrote it.

use std::{process::Stdio, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, ChildStdout},
    runtime::Runtime,
};

use crate::{
    chunking::Chunk,
    config::{AnswerMode, QaConfig},
    error::{Error, Result},
    text_util::{split_sentences, word_count, word_set},
};

/// Returned when retrieval produced nothing to answer from.
pub const NOT_FOUND: &str = "Answer not found in the uploaded PDF.";

/// Returned when the retrieved text has no usable sentence.
pub const NOT_CLEARLY_FOUND: &str = "Relevant answer not clearly found.";

/// Phrases that mark a generated answer as a non-answer.
const EVASIVE_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i'm not sure",
    "i am not sure",
    "cannot answer",
    "can't answer",
    "unable to answer",
    "not mentioned in the context",
    "not provided in the context",
    "no information",
    "the context does not",
];

/// Produces an answer to `question` from already-retrieved chunks.
pub trait Synthesizer {
    /// The answer text and the strategy that produced it, which differs
    /// from [`mode`](Self::mode) when a generative synthesizer falls back.
    fn synthesize(&self, chunks: &[Chunk], question: &str) -> (String, AnswerMode);

    fn answer(&self, chunks: &[Chunk], question: &str) -> String {
        self.synthesize(chunks, question).0
    }

    /// The strategy this synthesizer is configured for.
    fn mode(&self) -> AnswerMode;
}

/// Pick the single best-matching sentence, no model involved.
#[derive(Debug, Clone)]
pub struct ExtractiveSynthesizer {
    context_chunks: usize,
    min_sentence_chars: usize,
}

impl Default for ExtractiveSynthesizer {
    fn default() -> Self {
        Self::from_config(&QaConfig::default())
    }
}

impl ExtractiveSynthesizer {
    /// Read sentences from the first `context_chunks` chunks, ignoring
    /// sentences under `min_sentence_chars` characters.
    pub fn new(context_chunks: usize, min_sentence_chars: usize) -> Self {
        Self {
            context_chunks,
            min_sentence_chars,
        }
    }

    pub fn from_config(config: &QaConfig) -> Self {
        Self::new(config.context_chunks, config.min_sentence_chars)
    }
}

impl ExtractiveSynthesizer {
    fn extract(&self, chunks: &[Chunk], question: &str) -> String {
        if chunks.is_empty() {
            return NOT_FOUND.to_string();
        }

        let combined = chunks
            .iter()
            .take(self.context_chunks)
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let sentences: Vec<&str> = split_sentences(&combined)
            .into_iter()
            .filter(|s| s.chars().count() >= self.min_sentence_chars)
            .collect();
        let Some(first) = sentences.first() else {
            return NOT_CLEARLY_FOUND.to_string();
        };

        let question_words = word_set(question);
        let mut best = *first;
        let mut best_overlap = 0;
        for &sentence in &sentences {
            let overlap = word_set(sentence).intersection(&question_words).count();
            if overlap > best_overlap {
                best_overlap = overlap;
                best = sentence;
            }
        }

        tracing::debug!(
            candidates = sentences.len(),
            overlap = best_overlap,
            "picked extractive answer"
        );
        best.to_string()
    }
}

impl Synthesizer for ExtractiveSynthesizer {
    fn synthesize(&self, chunks: &[Chunk], question: &str) -> (String, AnswerMode) {
        (self.extract(chunks, question), AnswerMode::Extractive)
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::Extractive
    }
}

/// An external text generator: prompt in, text out.
///
/// Any `Fn(&str) -> Result<String>` closure is a generator, which keeps
/// tests free of real models.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate, giving up after `timeout`.
    ///
    /// The default ignores the limit; callers bound the wait themselves.
    /// Generators that own an external process override this so the
    /// process is stopped when the limit passes.
    fn generate_within(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let _ = timeout;
        self.generate(prompt)
    }
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// Runs an external program, writing the prompt to its stdin and reading
/// the answer from its stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `ollama run llama3`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the command line is blank.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            Error::Config("generator command is empty".to_string())
        })?;
        Ok(Self::new(program, parts.collect()))
    }
}

impl CommandGenerator {
    /// Spawn the program, exchange prompt and answer, and kill it if
    /// `limit` passes first. The child never outlives this call.
    async fn run(&self, prompt: &str, limit: Option<Duration>) -> Result<String> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Generation(format!("cannot start {}: {e}", self.program))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let conversation = exchange(&mut child, stdin, stdout, prompt);
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, conversation)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Generation(format!(
                        "{} timed out after {} ms",
                        self.program,
                        limit.as_millis()
                    )))
                }),
            None => conversation.await,
        };

        match outcome {
            Ok((status, _)) if !status.success() => Err(Error::Generation(format!(
                "{} exited with {status}",
                self.program
            ))),
            Ok((_, stdout)) => Ok(String::from_utf8_lossy(&stdout).into_owned()),
            Err(e) => {
                // Fails if the child already exited.
                if let Err(kill) = child.kill().await {
                    tracing::debug!(error = %kill, "generator already stopped");
                }
                Err(e)
            }
        }
    }

    fn block_on(&self, prompt: &str, limit: Option<Duration>) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(prompt, limit))
    }
}

/// Write the prompt and read stdout concurrently, then wait for exit.
async fn exchange(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    prompt: &str,
) -> Result<(std::process::ExitStatus, Vec<u8>)> {
    let send = async {
        if let Some(mut stdin) = stdin {
            stdin.write_all(prompt.as_bytes()).await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let receive = async {
        let mut out = Vec::new();
        if let Some(mut stdout) = stdout {
            stdout.read_to_end(&mut out).await?;
        }
        Ok::<_, std::io::Error>(out)
    };

    let (sent, received) = tokio::join!(send, receive);
    sent.map_err(|e| Error::Generation(format!("cannot send prompt: {e}")))?;
    let out =
        received.map_err(|e| Error::Generation(format!("cannot read answer: {e}")))?;
    let status = child
        .wait()
        .await
        .map_err(|e| Error::Generation(format!("generator failed: {e}")))?;
    Ok((status, out))
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.block_on(prompt, None)
    }

    fn generate_within(&self, prompt: &str, timeout: Duration) -> Result<String> {
        self.block_on(prompt, Some(timeout))
    }
}

/// Asks an external generator, with one retry and an extractive fallback.
pub struct GenerativeSynthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    min_answer_words: usize,
    fallback: ExtractiveSynthesizer,
    runtime: Option<Runtime>,
}

impl GenerativeSynthesizer {
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the timer runtime cannot be started.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        timeout: Duration,
        min_answer_words: usize,
        fallback: ExtractiveSynthesizer,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self {
            generator,
            timeout,
            min_answer_words,
            fallback,
            runtime: Some(runtime),
        })
    }

    pub fn from_config(
        config: &QaConfig,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        Self::new(
            generator,
            config.generator_timeout(),
            config.min_answer_words,
            ExtractiveSynthesizer::from_config(config),
        )
    }

    /// Run the generator on a blocking thread and stop waiting after
    /// `timeout`. The generator gets the same limit, so a process-backed
    /// one stops its child; any other late result is discarded.
    fn generate(&self, prompt: &str) -> Result<String> {
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            Error::Generation("runtime already shut down".to_string())
        })?;
        let generator = Arc::clone(&self.generator);
        let prompt = prompt.to_string();
        let timeout = self.timeout;

        runtime.block_on(async move {
            let task =
                tokio::task::spawn_blocking(move || {
                    generator.generate_within(&prompt, timeout)
                });
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    Err(Error::Generation(format!("generator task failed: {e}")))
                }
                Err(_) => Err(Error::Generation(format!(
                    "timed out after {} ms",
                    timeout.as_millis()
                ))),
            }
        })
    }

    /// One generator call, rejecting degenerate output.
    fn attempt(&self, prompt: &str) -> Result<String> {
        let answer = self.generate(prompt)?;
        let answer = answer.trim();

        if answer.is_empty() {
            return Err(Error::Generation("empty answer".to_string()));
        }
        let words = word_count(answer);
        if words < self.min_answer_words {
            return Err(Error::Generation(format!(
                "answer too short ({words} words)"
            )));
        }
        let lower = answer.to_lowercase();
        if EVASIVE_PHRASES.iter().any(|p| lower.contains(p)) {
            return Err(Error::Generation("generic non-answer".to_string()));
        }

        Ok(answer.to_string())
    }
}

impl Drop for GenerativeSynthesizer {
    fn drop(&mut self) {
        // A timed-out closure generator may still be running; don't wait.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Synthesizer for GenerativeSynthesizer {
    fn synthesize(&self, chunks: &[Chunk], question: &str) -> (String, AnswerMode) {
        if chunks.is_empty() {
            return (NOT_FOUND.to_string(), AnswerMode::Extractive);
        }

        match self.attempt(&grounded_prompt(chunks, question)) {
            Ok(answer) => return (answer, AnswerMode::Generative),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, retrying with a direct prompt");
            }
        }

        match self.attempt(&direct_prompt(question)) {
            Ok(answer) => (answer, AnswerMode::Generative),
            Err(e) => {
                tracing::warn!(error = %e, "retry failed, using extractive answer");
                self.fallback.synthesize(chunks, question)
            }
        }
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::Generative
    }
}

impl std::fmt::Debug for GenerativeSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeSynthesizer")
            .field("timeout", &self.timeout)
            .field("min_answer_words", &self.min_answer_words)
            .finish()
    }
}

/// The retrieval-grounded prompt asking for a structured study answer.
pub fn grounded_prompt(chunks: &[Chunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a study assistant helping a student prepare for an exam.\n\
         Answer the question using only the context below.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Structure the answer as:\n\
         1. A short heading\n\
         2. Definition\n\
         3. Key points\n\
         4. An example\n\
         5. A note on anything to remember\n"
    )
}

/// The simplified prompt used when the grounded one gives a bad answer.
pub fn direct_prompt(question: &str) -> String {
    format!("Explain clearly and simply for a student: {question}")
}

//! Rendering question/answer pairs for display.
//!
//! Output is always safe to drop into a larger HTML page: the HTML style
//! escapes every piece of user or document text, and the plain style
//! escapes `&`, `<` and `>` so no markup from the input survives.

use serde::Serialize;

use crate::{
    config::AnswerMode,
    text_util::{capitalize_first, escape_html, escape_markup},
};

/// Appended below answers written by an external generator.
pub const GENERATED_NOTE: &str =
    "Generated from your document. Double-check key facts against the source.";

/// One answered sub-question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    /// Strategy that produced `text`.
    pub mode: AnswerMode,
}

impl Answer {
    pub fn new(
        question: impl Into<String>,
        text: impl Into<String>,
        mode: AnswerMode,
    ) -> Self {
        Self {
            question: question.into(),
            text: text.into(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    /// `qa-block` divs for embedding in a web page.
    Html,
    /// Titled text blocks for a terminal.
    #[default]
    Plain,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    style: FormatStyle,
}

impl Formatter {
    pub fn new(style: FormatStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> FormatStyle {
        self.style
    }

    /// Render one question and its answer as a titled block.
    ///
    /// # Examples
    ///
    /// ```
    /// use docqa::format::{FormatStyle, Formatter};
    ///
    /// let html = Formatter::new(FormatStyle::Html)
    ///     .format("what is <ATP>", "Energy currency.");
    /// assert!(html.contains("What is &lt;ATP&gt;"));
    /// assert!(html.contains("Energy currency."));
    /// ```
    pub fn format(&self, question: &str, answer: &str) -> String {
        self.block(question, answer, None)
    }

    /// Render an [`Answer`], adding the closing note for generated text.
    pub fn format_answer(&self, answer: &Answer) -> String {
        let note = (answer.mode == AnswerMode::Generative).then_some(GENERATED_NOTE);
        self.block(&answer.question, &answer.text, note)
    }

    /// Render every answer in order, separated by a blank line.
    ///
    /// Repeated questions are rendered each time they appear.
    pub fn join(&self, answers: &[Answer]) -> String {
        answers
            .iter()
            .map(|a| self.format_answer(a))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Title line naming the document the answers came from.
    pub fn header(&self, document: &str) -> String {
        match self.style {
            FormatStyle::Html => format!(
                "<div class=\"answer-source\">Answer from PDF: {}</div>\n",
                escape_html(document)
            ),
            FormatStyle::Plain => {
                format!("Answer from PDF: {}\n", escape_markup(document))
            }
        }
    }

    fn block(&self, question: &str, answer: &str, note: Option<&str>) -> String {
        let title = capitalize_first(question.trim());
        let body = answer.trim();

        match self.style {
            FormatStyle::Html => {
                let mut out = String::from("<div class=\"qa-block\">\n");
                out.push_str(&format!(
                    "  <div class=\"question-title\">{}</div>\n",
                    escape_html(&title)
                ));
                out.push_str(&format!(
                    "  <div class=\"answer-content\">{}</div>\n",
                    escape_html(body)
                ));
                if let Some(note) = note {
                    out.push_str(&format!(
                        "  <div class=\"answer-note\">{}</div>\n",
                        escape_html(note)
                    ));
                }
                out.push_str("</div>\n");
                out
            }
            FormatStyle::Plain => {
                let mut out = format!(
                    "Q: {}\n{}\n",
                    escape_markup(&title),
                    escape_markup(body)
                );
                if let Some(note) = note {
                    out.push_str(&format!("({note})\n"));
                }
                out
            }
        }
    }
}

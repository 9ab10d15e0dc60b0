//! Splitting compound user input into independent sub-questions.

use std::sync::LazyLock;

use regex::Regex;

/// A `?`, or the whole word "and" in any casing.
static QUESTION_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\?|\band\b").expect("valid regex"));

/// Split raw input into sub-questions, in the order they were asked.
///
/// Every `?` and every standalone "and" is a boundary. Fragments are
/// trimmed and blank fragments dropped; casing is left as typed.
///
/// # Examples
///
/// ```
/// use docqa::question::split_questions;
///
/// assert_eq!(
///     split_questions("What is X and what is Y?"),
///     vec!["What is X", "what is Y"]
/// );
/// assert_eq!(split_questions("  Define osmosis "), vec!["Define osmosis"]);
/// ```
pub fn split_questions(raw: &str) -> Vec<String> {
    QUESTION_BOUNDARY
        .split(raw)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_and_and_question_marks() {
        assert_eq!(
            split_questions("What is X and what is Y?"),
            vec!["What is X", "what is Y"]
        );
    }

    #[test]
    fn and_is_case_insensitive() {
        assert_eq!(
            split_questions("define mitosis AND meiosis And osmosis"),
            vec!["define mitosis", "meiosis", "osmosis"]
        );
    }

    #[test]
    fn and_inside_words_is_not_a_boundary() {
        assert_eq!(
            split_questions("Who founded the band Anderson Sandals?"),
            vec!["Who founded the band Anderson Sandals"]
        );
    }

    #[test]
    fn multiple_question_marks() {
        assert_eq!(
            split_questions("What is ATP? Where is it made?? Why"),
            vec!["What is ATP", "Where is it made", "Why"]
        );
    }

    #[test]
    fn no_delimiters_returns_trimmed_input() {
        assert_eq!(
            split_questions("   explain photosynthesis  "),
            vec!["explain photosynthesis"]
        );
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(split_questions("").is_empty());
        assert!(split_questions("  ? and ?? AND ").is_empty());
    }

    #[test]
    fn splitting_is_idempotent() {
        for fragment in split_questions("What is X and what is Y?") {
            assert_eq!(split_questions(&fragment), vec![fragment.clone()]);
        }
    }

    #[test]
    fn repeated_questions_are_kept() {
        assert_eq!(
            split_questions("what is ATP? what is ATP?"),
            vec!["what is ATP", "what is ATP"]
        );
    }
}

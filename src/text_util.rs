use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

/// Sentence terminator followed by the whitespace that separates it from
/// the next sentence.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

/// Split text into sentences after `.`, `!` or `?` followed by whitespace.
///
/// The terminator stays with its sentence; each sentence is trimmed and
/// empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        // Terminators are ASCII, so the sentence ends one byte into the match.
        let end = m.start() + 1;
        push_trimmed(&mut sentences, &text[start..end]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece);
    }
}

/// Lowercased whitespace-separated words. Punctuation stays attached.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Upper-case the first character and keep the rest as written.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape the characters that are significant inside HTML markup.
/// Escape the characters that start markup (`&`, `<` and `>`), leaving
/// quotes readable. Enough for text content, not for attribute values.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sentences_basic() {
        let text = "The cell is alive. It divides!  Does it grow? Yes";
        assert_eq!(
            split_sentences(text),
            vec!["The cell is alive.", "It divides!", "Does it grow?", "Yes"]
        );
    }

    #[test]
    fn split_sentences_keeps_inner_dots() {
        let text = "Version 3.14 is out. See e.g.the notes.";
        assert_eq!(
            split_sentences(text),
            vec!["Version 3.14 is out.", "See e.g.the notes."]
        );
    }

    #[test]
    fn split_sentences_handles_newlines() {
        let text = "Line one.\nLine two.\n\n";
        assert_eq!(split_sentences(text), vec!["Line one.", "Line two."]);
    }

    #[test]
    fn split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn word_set_lowercases() {
        let words = word_set("ATP  produces atp Energy");
        assert_eq!(words.len(), 3);
        assert!(words.contains("atp"));
        assert!(words.contains("energy"));
    }

    #[test]
    fn word_count_basic() {
        assert_eq!(word_count("  one two\tthree\n"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn capitalize_first_keeps_rest() {
        assert_eq!(capitalize_first("what is ATP"), "What is ATP");
        assert_eq!(capitalize_first("élan"), "Élan");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn escape_markup_keeps_quotes() {
        assert_eq!(
            escape_markup(r#"<b>"Tom" & 'Jerry'</b>"#),
            r#"&lt;b&gt;"Tom" &amp; 'Jerry'&lt;/b&gt;"#
        );
    }

    #[test]
    fn escape_html_special_chars() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}

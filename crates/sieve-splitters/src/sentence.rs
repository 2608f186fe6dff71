use regex::Regex;

use crate::SentenceSplitter;

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "no", "e.g", "i.e", "inc", "ltd",
    "co", "mt", "ft", "gen", "col", "lt", "sgt", "rev", "u.s", "u.k", "approx", "fig", "jan",
    "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// Rule-based sentence boundary detection.
///
/// A boundary is terminal punctuation (`.`, `!`, `?`, optionally followed by
/// closing quotes or brackets) followed by whitespace, or a blank line.
/// A period does not end a sentence after a known abbreviation or a single
/// letter initial, and no boundary is placed before a lowercase word.
pub struct RuleSentenceSplitter {
    boundary: Regex,
}

impl RuleSentenceSplitter {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r#"[.!?]+["'”’)\]]*\s+|\n[ \t]*\n\s*"#)
                .expect("sentence boundary pattern is valid"),
        }
    }

    fn is_boundary(&self, text: &str, start: usize, m: &regex::Match<'_>) -> bool {
        let punct = m.as_str();
        if punct.starts_with('\n') {
            return true;
        }

        if let Some(next) = text[m.end()..].chars().next() {
            if next.is_lowercase() {
                return false;
            }
        }

        if punct.starts_with('.') && !punct.starts_with("..") {
            let before = &text[start..m.start()];
            let word = before
                .rsplit(char::is_whitespace)
                .next()
                .unwrap_or("")
                .trim_start_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            let is_initial = word.chars().count() == 1 && word.chars().all(char::is_alphabetic);
            if is_initial || ABBREVIATIONS.contains(&word.as_str()) {
                return false;
            }
        }
        true
    }
}

impl Default for RuleSentenceSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceSplitter for RuleSentenceSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.boundary.find_iter(text) {
            if !self.is_boundary(text, start, &m) {
                continue;
            }
            let sentence = text[start..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }

        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
        sentences
    }
}

/// English stop words dropped at index and query time. Sorted for binary search.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "although",
    "always", "am", "among", "an", "and", "another", "any", "are", "around", "as", "at", "be",
    "became", "because", "become", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "done", "down", "during", "each",
    "either", "else", "enough", "even", "ever", "every", "few", "for", "from", "further", "had",
    "has", "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his",
    "how", "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "least",
    "less", "made", "many", "may", "me", "might", "more", "most", "much", "must", "my",
    "myself", "neither", "never", "no", "nor", "not", "now", "of", "off", "often", "on", "once",
    "only", "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over",
    "own", "per", "perhaps", "quite", "rather", "really", "same", "say", "see", "seem",
    "seemed", "several", "she", "should", "since", "so", "some", "still", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "therefore",
    "these", "they", "this", "those", "though", "through", "thus", "to", "together", "too",
    "toward", "under", "until", "up", "upon", "us", "used", "using", "very", "via", "was", "we",
    "well", "were", "what", "whatever", "when", "where", "whether", "which", "while", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Normalize text into BM25 terms.
///
/// Lowercases, splits on whitespace, strips leading and trailing ASCII
/// punctuation from each token, and drops tokens that end up empty or are
/// stop words. Index construction and query scoring both go through here.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|token| !token.is_empty() && !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

//! Text tokenization for BM25 indexing.

use std::collections::{HashMap, HashSet};

/// Common English stop words dropped during tokenization.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this", "but",
    "they", "have", "had", "what", "when", "where", "who", "which", "why", "how", "all", "each",
    "every", "both", "few", "more", "most", "other", "some", "such", "no", "not", "only", "same",
    "so", "than", "too", "very", "can", "just", "should", "now", "i", "you", "we", "me", "my",
    "your", "our", "their", "him", "her",
];

/// Normalizes text into a token stream: lowercase, maximal alphanumeric
/// runs, tokens under two bytes dropped, stop words removed.
/// Deterministic and pure.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a tokenizer with the default English stop-word set.
    pub fn new() -> Self {
        Self {
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a tokenizer with a custom stop-word set.
    pub fn with_stop_words(stop_words: HashSet<String>) -> Self {
        Self { stop_words }
    }

    /// Split text into normalized tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();

        for c in text.chars() {
            if c.is_alphanumeric() {
                current.extend(c.to_lowercase());
            } else if !current.is_empty() {
                if self.is_valid_token(&current) {
                    tokens.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
        }

        if !current.is_empty() && self.is_valid_token(&current) {
            tokens.push(current);
        }

        tokens
    }

    fn is_valid_token(&self, token: &str) -> bool {
        // Length is measured in UTF-8 bytes, so a single multi-byte
        // character (e.g. "é" or one CJK character) is a valid token
        if token.len() < 2 {
            return false;
        }
        !self.stop_words.contains(token)
    }

    /// Return a map of token to frequency count.
    pub fn token_frequencies(&self, text: &str) -> HashMap<String, usize> {
        let mut freqs = HashMap::new();
        for token in self.tokenize(text) {
            *freqs.entry(token).or_insert(0) += 1;
        }
        freqs
    }

    /// Total number of tokens in the text.
    pub fn token_count(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokenization() {
        let t = Tokenizer::new();
        let tokens = t.tokenize("PostgreSQL provides vector search");
        assert_eq!(tokens, vec!["postgresql", "provides", "vector", "search"]);
    }

    #[test]
    fn test_lowercases_input() {
        let t = Tokenizer::new();
        assert_eq!(t.tokenize("HELLO World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_splits_on_non_alphanumeric() {
        let t = Tokenizer::new();
        let tokens = t.tokenize("foo_bar-baz.qux,42");
        assert_eq!(tokens, vec!["foo", "bar", "baz", "qux", "42"]);
    }

    #[test]
    fn test_drops_short_tokens() {
        let t = Tokenizer::new();
        // "x" is a single byte; "db" survives
        let tokens = t.tokenize("x db");
        assert_eq!(tokens, vec!["db"]);
    }

    #[test]
    fn test_single_multibyte_char_is_kept() {
        let t = Tokenizer::new();
        // One non-ASCII character is already two or more UTF-8 bytes
        assert_eq!(t.tokenize("é x"), vec!["é"]);
        assert_eq!(t.tokenize("日 y"), vec!["日"]);
    }

    #[test]
    fn test_drops_stop_words() {
        let t = Tokenizer::new();
        let tokens = t.tokenize("the quick brown fox and the lazy dog");
        assert_eq!(tokens, vec!["quick", "brown", "fox", "lazy", "dog"]);
    }

    #[test]
    fn test_custom_stop_words() {
        let stop: HashSet<String> = ["quick".to_string()].into_iter().collect();
        let t = Tokenizer::with_stop_words(stop);
        let tokens = t.tokenize("the quick fox");
        assert_eq!(tokens, vec!["the", "fox"]);
    }

    #[test]
    fn test_unicode_tokens() {
        let t = Tokenizer::new();
        let tokens = t.tokenize("café naïve 北京大学");
        assert_eq!(tokens, vec!["café", "naïve", "北京大学"]);
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        let t = Tokenizer::new();
        assert!(t.tokenize("").is_empty());
        assert!(t.tokenize("!!! ... ---").is_empty());
    }

    #[test]
    fn test_token_frequencies() {
        let t = Tokenizer::new();
        let freqs = t.token_frequencies("alpha beta alpha gamma alpha");
        assert_eq!(freqs.get("alpha"), Some(&3));
        assert_eq!(freqs.get("beta"), Some(&1));
        assert_eq!(freqs.get("gamma"), Some(&1));
    }

    #[test]
    fn test_deterministic() {
        let t = Tokenizer::new();
        let text = "Hybrid search combines BM25 with vector similarity";
        assert_eq!(t.tokenize(text), t.tokenize(text));
    }

    #[test]
    fn test_token_count() {
        let t = Tokenizer::new();
        assert_eq!(t.token_count("alpha beta gamma"), 3);
    }
}

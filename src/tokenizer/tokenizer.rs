//! Byte-level tokenization shared by the builder and the query path
//!
//! A token is a maximal run of ASCII alphanumerics, lowercased. Everything
//! else separates. Indexing and querying additionally drop one-character
//! tokens and a small fixed stoplist.

use std::collections::HashSet;
use std::sync::OnceLock;

static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn stopwords() -> &'static HashSet<&'static str> {
    STOPWORDS.get_or_init(|| {
        [
            "the", "a", "an", "and", "or", "of", "to", "in", "for", "on", "with", "by", "as",
            "is", "are", "was", "were", "be", "been", "it", "this", "that", "from", "at",
        ]
        .into_iter()
        .collect()
    })
}

/// Check a token against the stoplist
pub fn is_stopword(token: &str) -> bool {
    stopwords().contains(token)
}

/// Split text into lowercase alphanumeric-run tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();

    for &byte in text.as_bytes() {
        if byte.is_ascii_alphanumeric() {
            cur.push(byte.to_ascii_lowercase() as char);
        } else if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Tokenize and apply the indexing filters (length >= 2, no stopwords)
pub fn query_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() >= 2 && !is_stopword(t))
        .collect()
}

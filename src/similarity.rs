// src/similarity.rs
//! Token-sort fuzzy title similarity. Sorting the tokens first makes the
//! measure invariant to word order, so "OpenAI Releases GPT-5" and
//! "GPT-5 Released by OpenAI" score close despite the reordering.

/// Lowercase, split on whitespace, sort tokens, re-join.
fn token_sort_key(s: &str) -> String {
    let mut tokens: Vec<String> = s
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Normalized similarity in [0, 1] between two titles, independent of token
/// order and case. Symmetric.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let ka = token_sort_key(a);
    let kb = token_sort_key(b);
    if ka.is_empty() && kb.is_empty() {
        return 1.0;
    }
    strsim::normalized_levenshtein(&ka, &kb)
}

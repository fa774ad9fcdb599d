//! Lexical primitives shared by the index, the fact checker, the classifier
//! and the clarification engine.
//!
//! Tokens are maximal runs of Unicode letters or digits, lower-cased. Every
//! similarity here is set-based, so repeated words never inflate a score.

use std::collections::HashSet;

/// English and Indonesian function words that carry no topical signal.
const STOPWORDS: &[&str] = &[
    // English
    "a", "about", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "did", "do",
    "does", "for", "from", "had", "has", "have", "he", "her", "him", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our", "please", "she",
    "so", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "to", "too", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "you", "your",
    // Indonesian
    "ada", "adalah", "agar", "akan", "aku", "anda", "apa", "apakah", "atau", "bagaimana", "bahwa",
    "begitu", "berapa", "bisa", "buat", "dalam", "dan", "dapat", "dari", "dengan", "di", "dia",
    "gimana", "harus", "hal", "ini", "itu", "jadi", "jika", "juga", "kalau", "kami", "kamu",
    "kapan", "karena", "ke", "kenapa", "ketika", "kita", "lagi", "mana", "mengapa", "mereka",
    "nya", "oleh", "pada", "saja", "saya", "sebagai", "sedang", "siapa", "sudah", "tentang",
    "tersebut", "tolong", "untuk", "yang",
];

/// Split text into lower-cased runs of Unicode letters and digits.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Distinct tokens of a text.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Contiguous token sequences of length `n`, joined by a single space.
///
/// Returns an empty list when `n` is zero or longer than the token list.
pub fn ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// All distinct n-grams of length `1..=max_n`.
pub fn ngram_set(text: &str, max_n: usize) -> HashSet<String> {
    let tokens = tokenize(text);
    let mut set = HashSet::new();
    for n in 1..=max_n {
        set.extend(ngrams(&tokens, n));
    }
    set
}

/// Jaccard index of two sets: |A ∩ B| / |A ∪ B|, or 0.0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity over the n-gram sets (n = 1..=max_n) of two texts.
pub fn ngram_jaccard(a: &str, b: &str, max_n: usize) -> f64 {
    jaccard(&ngram_set(a, max_n), &ngram_set(b, max_n))
}

/// Fraction of the distinct tokens of `query` that also occur in `text`.
pub fn token_overlap(query: &str, text: &str) -> f64 {
    let query_tokens = token_set(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens = token_set(text);
    let shared = query_tokens.intersection(&text_tokens).count();
    shared as f64 / query_tokens.len() as f64
}

/// Whether a lower-cased token is a function word.
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Content-bearing tokens of at least `min_len` characters, in first-seen order.
pub fn keywords(text: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= min_len && !is_stopword(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max_chars` characters of a text, with an ellipsis when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Apa itu Kecerdasan-Buatan?"),
            vec!["apa", "itu", "kecerdasan", "buatan"]
        );
    }

    #[test]
    fn test_tokenize_keeps_unicode_letters_and_digits() {
        assert_eq!(tokenize("Café 42, naïve!"), vec!["café", "42", "naïve"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ?!  ").is_empty());
    }

    #[test]
    fn test_ngrams_basic() {
        let tokens = tokenize("a b c");
        assert_eq!(ngrams(&tokens, 2), vec!["a b", "b c"]);
        assert_eq!(ngrams(&tokens, 3), vec!["a b c"]);
        assert!(ngrams(&tokens, 4).is_empty());
        assert!(ngrams(&tokens, 0).is_empty());
    }

    #[test]
    fn test_ngram_set_counts_all_orders() {
        // 3 unigrams + 2 bigrams + 1 trigram
        assert_eq!(ngram_set("one two three", 3).len(), 6);
    }

    #[test]
    fn test_jaccard_identical_and_disjoint() {
        assert!((ngram_jaccard("the cat sat", "the cat sat", 3) - 1.0).abs() < 1e-12);
        assert_eq!(ngram_jaccard("alpha beta", "gamma delta", 3), 0.0);
        assert_eq!(ngram_jaccard("", "", 3), 0.0);
    }

    #[test]
    fn test_token_overlap_is_query_coverage() {
        assert!((token_overlap("kecerdasan buatan", "kecerdasan buatan adalah") - 1.0).abs() < 1e-12);
        assert!((token_overlap("apa itu kecerdasan buatan", "kecerdasan buatan") - 0.5).abs() < 1e-12);
        assert_eq!(token_overlap("", "anything"), 0.0);
    }

    #[test]
    fn test_keywords_drop_stopwords_and_duplicates() {
        assert_eq!(
            keywords("Apa itu kecerdasan buatan dan kecerdasan mesin", 4),
            vec!["kecerdasan", "buatan", "mesin"]
        );
    }

    #[test]
    fn test_snippet_cuts_long_text() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("abcdefghij klm", 10), "abcdefghij…");
    }
}

//! Title normalisation and similarity.
//!
//! Titles from different publication indices differ in case, punctuation
//! and abbreviation ("via ML" vs "via Machine Learning"). Comparison runs on
//! normalised titles and uses the longest common subsequence of characters.

use similar::{DiffTag, TextDiff};

/// Normalised titles shorter than this never match anything.
pub const MIN_COMPARABLE_CHARS: usize = 10;

/// Titles whose normalised lengths differ by more than this factor never
/// match, so a short title is not absorbed by every longer one containing it.
pub const MIN_LENGTH_BALANCE: f64 = 0.6;

/// Case-fold, strip punctuation, and collapse whitespace.
///
/// Letters, digits and underscores are kept; every other non-space
/// character is removed without leaving a gap.
pub fn normalize_title(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the longest common character subsequence of `a` and `b`.
fn common_subsequence_len(a: &str, b: &str) -> usize {
    TextDiff::from_chars(a, b)
        .ops()
        .iter()
        .filter(|op| op.tag() == DiffTag::Equal)
        .map(|op| op.old_range().len())
        .sum()
}

/// Similarity of two already-normalised titles in `[0, 1]`.
///
/// The ratio is the longest common subsequence over the shorter title's
/// length, so an abbreviation whose letters all appear in order in the
/// expanded form scores 1.0. Symmetric in its arguments. Two empty strings
/// score 0.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let shorter = len_a.min(len_b);
    if shorter == 0 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    common_subsequence_len(a, b) as f64 / shorter as f64
}

/// Whether a normalised title is specific enough to be matched at all.
pub fn is_comparable(normalized: &str) -> bool {
    normalized.chars().count() >= MIN_COMPARABLE_CHARS
}

/// Whether one title is the other with whole words appended
/// ("fetal sleep states in sheep" and "... in sheep and humans").
///
/// [`title_similarity`] scores such pairs 1.0, the same as an abbreviation
/// pair, so they are told apart by word structure instead.
fn is_word_extension(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let short_words: Vec<&str> = short.split(' ').collect();
    let long_words: Vec<&str> = long.split(' ').collect();
    short_words.len() < long_words.len() && long_words.starts_with(&short_words)
}

/// Similarity gated by [`is_comparable`], [`MIN_LENGTH_BALANCE`] and the
/// word-extension check; `None` when the pair is not a merge candidate at
/// all.
pub fn candidate_similarity(a: &str, b: &str) -> Option<f64> {
    if !is_comparable(a) || !is_comparable(b) {
        return None;
    }
    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    if len_a.min(len_b) / len_a.max(len_b) < MIN_LENGTH_BALANCE {
        return None;
    }
    if is_word_extension(a, b) {
        return None;
    }
    Some(title_similarity(a, b))
}

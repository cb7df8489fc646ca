//! Reply segmentation for the mesh wire limit
//!
//! Mesh frames cap each text message at a small character budget. This
//! module splits a long reply into word-boundary chunks and appends a
//! ` (i/n)` position suffix so recipients can reassemble the sequence.
//! Splitting is pure and deterministic; no I/O happens here.

use super::DeliveryError;

/// Worst-case position suffix reserved while partitioning (` (99/99)`)
const SUFFIX_RESERVE: usize = " (99/99)".len();

/// Result of segmenting one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmented {
    /// Ordered wire-ready chunks, each within the requested limit
    pub chunks: Vec<String>,
    /// Number of pathological words truncated to fit the per-chunk budget
    pub truncated_words: usize,
}

/// Split `text` into chunks of at most `limit` characters each
///
/// Text that fits within `limit` is returned as a single chunk with no
/// suffix, whitespace-normalized but with newlines preserved. Longer
/// text is packed greedily on word boundaries in two passes: first the
/// word partition is computed with fixed-width suffix space reserved,
/// then each chunk is rendered with its final ` (i/n)` marker. Words
/// are never split across chunks; a single word longer than the
/// per-chunk budget is truncated as a last resort and counted in
/// [`Segmented::truncated_words`].
///
/// Guarantees: every returned chunk has at most `limit` characters, and
/// joining the chunks' words (suffixes stripped) with single spaces
/// reproduces the input's word sequence.
///
/// # Errors
///
/// Returns [`DeliveryError::EmptyContent`] for whitespace-only input and
/// [`DeliveryError::LimitTooSmall`] when `limit` cannot accommodate a
/// chunk plus its position suffix. Both are rejected before any other
/// work.
pub fn split_message(text: &str, limit: usize) -> Result<Segmented, DeliveryError> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Err(DeliveryError::EmptyContent);
    }
    if limit <= SUFFIX_RESERVE {
        return Err(DeliveryError::LimitTooSmall { limit });
    }

    if normalized.chars().count() <= limit {
        return Ok(Segmented {
            chunks: vec![normalized],
            truncated_words: 0,
        });
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();

    // The suffix width depends on the total chunk count, which depends on
    // how much room the suffix takes. Start from the two-digit worst case
    // and widen the reserve until the realized total fits it.
    let mut reserve = SUFFIX_RESERVE;
    loop {
        if reserve >= limit {
            return Err(DeliveryError::LimitTooSmall { limit });
        }

        let (parts, truncated_words) = pack_words(&words, limit - reserve);
        let total = parts.len();

        if total <= 1 {
            return Ok(Segmented {
                chunks: parts,
                truncated_words,
            });
        }

        let needed = suffix_width(total);
        if needed > reserve {
            reserve = needed;
            continue;
        }

        let chunks = parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| format!("{part} ({}/{total})", i + 1))
            .collect();

        return Ok(Segmented {
            chunks,
            truncated_words,
        });
    }
}

/// Collapse runs of spaces within each line, dropping blank edges, while
/// keeping intentional newlines for readability
fn normalize_whitespace(text: &str) -> String {
    text.trim()
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedily pack words into parts of at most `budget` characters
///
/// Returns the parts plus the count of words truncated because they
/// alone exceeded the budget.
fn pack_words(words: &[&str], budget: usize) -> (Vec<String>, usize) {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut truncated_words = 0usize;

    for &word in words {
        let word_len = word.chars().count();
        let (word, word_len) = if word_len > budget {
            truncated_words += 1;
            (word.chars().take(budget).collect::<String>(), budget)
        } else {
            (word.to_string(), word_len)
        };

        let needed = if current.is_empty() {
            word_len
        } else {
            word_len + 1
        };

        if current_len + needed <= budget {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
            current_len += needed;
        } else {
            parts.push(std::mem::take(&mut current));
            current.push_str(&word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    (parts, truncated_words)
}

/// Width of the widest ` (i/n)` suffix for a given chunk total
fn suffix_width(total: usize) -> usize {
    format!(" ({total}/{total})").chars().count()
}

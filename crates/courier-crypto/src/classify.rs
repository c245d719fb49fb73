//! Heuristic detection of text envelopes among legacy plaintext
//!
//! Stored messages from before encryption sit next to envelopes in the same
//! column. This decides which ones are worth a decryption attempt. It is not
//! a parser: a false negative shows raw ciphertext, a false positive fails
//! decryption and shows a placeholder. Neither is an error.
//!
//! Checks, in order:
//! 1. no whitespace
//! 2. exactly three `:`-separated segments
//! 3. every segment in the base64 alphabet (URL-safe tolerated)
//! 4. iv ≥ 12 bytes, tag ≥ 12 bytes, ciphertext ≥ 1 byte once decoded
//! 5. Shannon entropy of the colon-free text above the threshold

use std::collections::HashMap;

use courier_core::config::ClassifierConfig;

use crate::codec::{decode_lenient, DELIMITER};

const MIN_IV_BYTES: usize = 12;
// Lower than the 16-byte tag on purpose: older clients wrote truncated tags
const MIN_TAG_BYTES: usize = 12;
const MIN_CIPHERTEXT_BYTES: usize = 1;

#[derive(Debug, Clone)]
pub struct Classifier {
    entropy_threshold: f64,
    short_input_ratio: f64,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            entropy_threshold: config.entropy_threshold,
            short_input_ratio: config.short_input_ratio,
        }
    }

    pub fn looks_like_envelope(&self, text: &str) -> bool {
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return false;
        }

        let segments: Vec<&str> = text.split(DELIMITER).collect();
        let [iv, tag, ciphertext] = segments.as_slice() else {
            return false;
        };

        if !segments.iter().all(|s| is_base64_alphabet(s)) {
            return false;
        }

        let sized = decoded_len(iv).is_some_and(|n| n >= MIN_IV_BYTES)
            && decoded_len(tag).is_some_and(|n| n >= MIN_TAG_BYTES)
            && decoded_len(ciphertext).is_some_and(|n| n >= MIN_CIPHERTEXT_BYTES);
        if !sized {
            return false;
        }

        let body: String = segments.concat();
        shannon_entropy(&body) > self.threshold_for(body.chars().count())
    }

    /// A string of `n` characters carries at most log2(n) bits per character,
    /// so short envelopes are scored against a proportional ceiling.
    fn threshold_for(&self, len: usize) -> f64 {
        let ceiling = (len as f64).log2() * self.short_input_ratio;
        self.entropy_threshold.min(ceiling)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

/// Classify with the default thresholds.
pub fn looks_like_envelope(text: &str) -> bool {
    Classifier::default().looks_like_envelope(text)
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

fn is_base64_alphabet(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'-' | b'_'))
}

fn decoded_len(segment: &str) -> Option<usize> {
    decode_lenient(segment).ok().map(|bytes| bytes.len())
}

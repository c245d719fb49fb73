//! Display-side decryption that never fails
//!
//! Every stored message renders as something: its plaintext, its decrypted
//! text, or a visible placeholder. Partial or guessed content is never shown.

use std::fmt;

use crate::classify::Classifier;
use crate::codec::decode_text;
use crate::kdf::DerivedKey;
use crate::message::decrypt_text;

/// Placeholder shown in place of content that could not be decrypted
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[encrypted message: cannot decrypt]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Legacy content that was never encrypted
    Plain(String),
    /// Envelope decrypted with the session key
    Decrypted(String),
    /// Envelope that failed to decrypt, or no key in the session
    Undecryptable,
}

impl Rendered {
    pub fn text(&self) -> &str {
        match self {
            Rendered::Plain(text) | Rendered::Decrypted(text) => text,
            Rendered::Undecryptable => UNDECRYPTABLE_PLACEHOLDER,
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Render stored content with the default classifier.
pub fn render_text(key: Option<&DerivedKey>, stored: &str) -> Rendered {
    render_with(&Classifier::default(), key, stored)
}

pub fn render_with(classifier: &Classifier, key: Option<&DerivedKey>, stored: &str) -> Rendered {
    if !classifier.looks_like_envelope(stored) && !is_empty_envelope(stored) {
        return Rendered::Plain(stored.to_string());
    }

    let Some(key) = key else {
        return Rendered::Undecryptable;
    };

    match decrypt_text(key, stored) {
        Ok(text) => Rendered::Decrypted(text),
        Err(e) => {
            tracing::warn!(error = %e, "stored envelope did not decrypt; showing placeholder");
            Rendered::Undecryptable
        }
    }
}

/// An empty message encrypts to `iv:tag:`. There is no ciphertext for the
/// classifier to score, so the exact framing identifies it instead.
fn is_empty_envelope(stored: &str) -> bool {
    decode_text(stored).is_ok_and(|envelope| envelope.ciphertext.is_empty())
}

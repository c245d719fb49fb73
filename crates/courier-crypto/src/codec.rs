//! Envelope framing
//!
//! Text envelope (single string):
//! ```text
//! base64(iv[12]) ":" base64(tag[16]) ":" base64(ciphertext[N])
//! ```
//!
//! Binary envelope: the same three values kept apart. The ciphertext travels
//! as a raw body and IV/tag as base64 metadata, so large payloads are never
//! base64-inflated. Framing never looks inside the ciphertext.

use base64::{
    engine::general_purpose::{STANDARD as B64, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    DecodeError,
    Engine,
};

use crate::error::{CryptoError, CryptoResult};
use crate::{IV_SIZE, TAG_SIZE};

/// Segment separator of the text wire format
pub const DELIMITER: char = ':';

/// Decoded text envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEnvelope {
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl TextEnvelope {
    pub fn encode(&self) -> String {
        encode_text(&self.iv, &self.tag, &self.ciphertext)
    }
}

/// Encrypted binary payload with detached IV and tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryEnvelope {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
}

impl BinaryEnvelope {
    /// Rebuild an envelope from a stored body and its base64 IV/tag metadata.
    pub fn from_parts(ciphertext: Vec<u8>, iv_b64: &str, tag_b64: &str) -> CryptoResult<Self> {
        Ok(Self {
            ciphertext,
            iv: decode_fixed::<IV_SIZE>(iv_b64, "iv")?,
            tag: decode_fixed::<TAG_SIZE>(tag_b64, "tag")?,
        })
    }

    pub fn iv_base64(&self) -> String {
        B64.encode(self.iv)
    }

    pub fn tag_base64(&self) -> String {
        B64.encode(self.tag)
    }
}

/// Join IV, tag and ciphertext into the text wire format.
pub fn encode_text(iv: &[u8; IV_SIZE], tag: &[u8; TAG_SIZE], ciphertext: &[u8]) -> String {
    format!(
        "{}{DELIMITER}{}{DELIMITER}{}",
        B64.encode(iv),
        B64.encode(tag),
        B64.encode(ciphertext)
    )
}

/// Split a text envelope back into its parts.
///
/// The ciphertext segment may be empty only when it carries a zero-length
/// plaintext; IV and tag must be present with their exact sizes.
pub fn decode_text(envelope: &str) -> CryptoResult<TextEnvelope> {
    let segments: Vec<&str> = envelope.split(DELIMITER).collect();
    let [iv_b64, tag_b64, ct_b64] = segments.as_slice() else {
        return Err(CryptoError::MalformedEnvelope(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    Ok(TextEnvelope {
        iv: decode_fixed::<IV_SIZE>(iv_b64, "iv")?,
        tag: decode_fixed::<TAG_SIZE>(tag_b64, "tag")?,
        ciphertext: decode_segment(ct_b64, "ciphertext")?,
    })
}

/// Standard alphabet first; URL-safe and unpadded segments are tolerated.
pub(crate) fn decode_lenient(segment: &str) -> Result<Vec<u8>, DecodeError> {
    B64.decode(segment)
        .or_else(|_| URL_SAFE.decode(segment))
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .or_else(|_| URL_SAFE_NO_PAD.decode(segment))
}

fn decode_segment(segment: &str, name: &str) -> CryptoResult<Vec<u8>> {
    decode_lenient(segment).map_err(|e| {
        let msg = format!("{name} is not valid base64: {e}");
        CryptoError::MalformedEnvelope(msg)
    })
}

fn decode_fixed<const N: usize>(segment: &str, name: &str) -> CryptoResult<[u8; N]> {
    if segment.is_empty() {
        let msg = format!("{name} segment is empty");
        return Err(CryptoError::MalformedEnvelope(msg));
    }
    let bytes = decode_segment(segment, name)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        let msg = format!("{name} must be {N} bytes, got {}", bytes.len());
        CryptoError::MalformedEnvelope(msg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TextEnvelope {
        TextEnvelope {
            iv: [1u8; IV_SIZE],
            tag: [2u8; TAG_SIZE],
            ciphertext: b"opaque".to_vec(),
        }
    }

    #[test]
    fn test_encode_shape() {
        let encoded = sample().encode();
        let parts: Vec<&str> = encoded.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "AQEBAQEBAQEBAQEB");
        assert_eq!(parts[1].len(), 24);
        assert_eq!(parts[2], "b3BhcXVl");
    }

    #[test]
    fn test_decode_inverts_encode() {
        let envelope = sample();
        assert_eq!(decode_text(&envelope.encode()).unwrap(), envelope);
    }

    #[test]
    fn test_decode_empty_ciphertext() {
        let envelope = TextEnvelope {
            ciphertext: Vec::new(),
            ..sample()
        };
        let encoded = envelope.encode();

        assert!(encoded.ends_with(':'));
        assert_eq!(decode_text(&encoded).unwrap(), envelope);
    }

    #[test]
    fn test_decode_url_safe_segments() {
        let iv = [0xFBu8; IV_SIZE];
        let tag = [0xFFu8; TAG_SIZE];
        let url = format!(
            "{}:{}:{}",
            URL_SAFE.encode(iv),
            URL_SAFE.encode(tag),
            URL_SAFE.encode([0xFE, 0xFF])
        );
        let decoded = decode_text(&url).unwrap();

        assert_eq!(decoded.iv, iv);
        assert_eq!(decoded.tag, tag);
        assert_eq!(decoded.ciphertext, vec![0xFE, 0xFF]);
    }

    #[test]
    fn test_decode_unpadded_url_safe_segments() {
        let iv = [0xFBu8; IV_SIZE];
        let tag = [0xFFu8; TAG_SIZE];
        let ciphertext = [0xFE, 0xFF, 0xFB, 0x01];
        let url = format!(
            "{}:{}:{}",
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(tag),
            URL_SAFE_NO_PAD.encode(ciphertext)
        );
        assert!(!url.contains('='));

        let decoded = decode_text(&url).unwrap();
        assert_eq!(decoded.iv, iv);
        assert_eq!(decoded.tag, tag);
        assert_eq!(decoded.ciphertext, ciphertext);
    }

    #[test]
    fn test_wrong_segment_count() {
        for input in ["", "abc", "a:b", "a:b:c:d", "Hello, world!"] {
            let err = decode_text(input).unwrap_err();
            assert!(
                matches!(err, CryptoError::MalformedEnvelope(_)),
                "{input:?} must be malformed"
            );
        }
    }

    #[test]
    fn test_empty_iv_or_tag() {
        let tag = B64.encode([0u8; TAG_SIZE]);
        let iv = B64.encode([0u8; IV_SIZE]);

        assert!(decode_text(&format!(":{tag}:AA==")).is_err());
        assert!(decode_text(&format!("{iv}::AA==")).is_err());
    }

    #[test]
    fn test_wrong_iv_length() {
        let envelope = format!(
            "{}:{}:{}",
            B64.encode([0u8; 11]),
            B64.encode([0u8; TAG_SIZE]),
            B64.encode(b"x")
        );
        let err = decode_text(&envelope).unwrap_err();
        assert!(err.to_string().contains("iv must be 12 bytes"));
    }

    #[test]
    fn test_wrong_tag_length() {
        let envelope = format!(
            "{}:{}:{}",
            B64.encode([0u8; IV_SIZE]),
            B64.encode([0u8; 12]),
            B64.encode(b"x")
        );
        let err = decode_text(&envelope).unwrap_err();
        assert!(err.to_string().contains("tag must be 16 bytes"));
    }

    #[test]
    fn test_invalid_base64() {
        let envelope = format!(
            "{}:{}:***",
            B64.encode([0u8; IV_SIZE]),
            B64.encode([0u8; TAG_SIZE])
        );
        assert!(matches!(
            decode_text(&envelope),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_binary_from_parts() {
        let envelope = BinaryEnvelope {
            ciphertext: vec![9, 9, 9],
            iv: [3u8; IV_SIZE],
            tag: [4u8; TAG_SIZE],
        };
        let rebuilt = BinaryEnvelope::from_parts(
            envelope.ciphertext.clone(),
            &envelope.iv_base64(),
            &envelope.tag_base64(),
        )
        .unwrap();

        assert_eq!(rebuilt, envelope);
    }

    #[test]
    fn test_binary_from_parts_rejects_short_tag() {
        let err = BinaryEnvelope::from_parts(
            vec![1],
            &B64.encode([0u8; IV_SIZE]),
            &B64.encode([0u8; 15]),
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }
}

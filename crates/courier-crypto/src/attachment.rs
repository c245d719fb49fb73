//! Attachments: encrypt a file body and produce its transport metadata.
//!
//! The `sha256` field is computed over the ciphertext body. Storage can then
//! verify a blob without the key, and the hash reveals nothing about the
//! plaintext. Plaintext integrity is covered by the GCM tag.

use courier_core::types::AttachmentMeta;
use sha2::{Digest, Sha256};

use crate::binary::{decrypt_envelope, encrypt_bytes};
use crate::codec::BinaryEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;

/// Pixel dimensions carried as plaintext metadata for inline images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Encrypt an attachment body.
///
/// Returns the ciphertext body to upload and the metadata to send with it.
pub fn seal_attachment(
    key: &DerivedKey,
    body: &[u8],
    content_type: &str,
    dimensions: Option<ImageDimensions>,
) -> CryptoResult<(Vec<u8>, AttachmentMeta)> {
    let envelope = encrypt_bytes(key, body)?;

    let meta = AttachmentMeta {
        iv_base64: envelope.iv_base64(),
        auth_tag_base64: envelope.tag_base64(),
        content_type: content_type.to_string(),
        byte_length: envelope.ciphertext.len() as u64,
        width: dimensions.map(|d| d.width),
        height: dimensions.map(|d| d.height),
        sha256: Some(ciphertext_digest(&envelope.ciphertext)),
    };

    tracing::debug!(
        content_type,
        byte_length = meta.byte_length,
        "sealed attachment"
    );

    Ok((envelope.ciphertext, meta))
}

/// Verify an attachment body against its metadata and decrypt it.
///
/// Length or hash mismatches are reported as malformed envelopes before any
/// decryption is attempted.
pub fn open_attachment(
    key: &DerivedKey,
    body: Vec<u8>,
    meta: &AttachmentMeta,
) -> CryptoResult<Vec<u8>> {
    if body.len() as u64 != meta.byte_length {
        return Err(CryptoError::MalformedEnvelope(format!(
            "body is {} bytes, metadata says {}",
            body.len(),
            meta.byte_length
        )));
    }

    if let Some(expected) = &meta.sha256 {
        let actual = ciphertext_digest(&body);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(CryptoError::MalformedEnvelope(
                "body does not match its sha256".into(),
            ));
        }
    }

    let envelope = BinaryEnvelope::from_parts(body, &meta.iv_base64, &meta.auth_tag_base64)?;
    decrypt_envelope(key, &envelope)
}

/// Lowercase hex SHA-256 of a ciphertext body
pub fn ciphertext_digest(ciphertext: &[u8]) -> String {
    hex::encode(Sha256::digest(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn test_key() -> DerivedKey {
        DerivedKey::from_bytes([0x33u8; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let body = b"%PDF-1.7 not really a pdf".to_vec();

        let (ciphertext, meta) = seal_attachment(&key, &body, "application/pdf", None).unwrap();
        let opened = open_attachment(&key, ciphertext, &meta).unwrap();

        assert_eq!(opened, body);
    }

    #[test]
    fn test_meta_fields() {
        let key = test_key();
        let dims = ImageDimensions {
            width: 320,
            height: 200,
        };

        let sealed = seal_attachment(&key, &[0u8; 64], "image/png", Some(dims));
        let (ciphertext, meta) = sealed.unwrap();

        assert_eq!(meta.byte_length, 64);
        assert_eq!(meta.width, Some(320));
        assert_eq!(meta.height, Some(200));
        assert_eq!(meta.iv_base64.len(), 16);
        assert_eq!(meta.auth_tag_base64.len(), 24);

        let digest = meta.sha256.unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, ciphertext_digest(&ciphertext));
    }

    #[test]
    fn test_hash_mismatch_rejected() {
        let key = test_key();
        let (mut ciphertext, meta) = seal_attachment(&key, b"payload", "text/plain", None).unwrap();
        ciphertext[0] ^= 0xFF;

        assert!(matches!(
            open_attachment(&key, ciphertext, &meta),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let key = test_key();
        let (mut ciphertext, meta) = seal_attachment(&key, b"payload", "text/plain", None).unwrap();
        ciphertext.push(0);

        assert!(matches!(
            open_attachment(&key, ciphertext, &meta),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_missing_hash_still_authenticated() {
        let key = test_key();
        let (mut ciphertext, mut meta) =
            seal_attachment(&key, b"payload", "text/plain", None).unwrap();
        meta.sha256 = None;
        ciphertext[0] ^= 0x01;

        assert!(matches!(
            open_attachment(&key, ciphertext, &meta),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = test_key();
        let (ciphertext, meta) = seal_attachment(&key, b"payload", "text/plain", None).unwrap();
        let other = DerivedKey::from_bytes([0x44u8; KEY_SIZE]);

        assert!(matches!(
            open_attachment(&other, ciphertext, &meta),
            Err(CryptoError::AuthenticationFailure)
        ));
    }
}

//! AES-256-GCM over raw byte buffers (images, documents)
//!
//! Output is detached: ciphertext, 12-byte IV and 16-byte tag come back as
//! three values. GCM is length-preserving, so `ciphertext.len()` always
//! equals the plaintext length.

use aes_gcm::{aead::AeadInPlace, Aes256Gcm, KeyInit, Nonce, Tag};
use rand::RngCore;
use zeroize::Zeroize;

use crate::codec::BinaryEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Largest plaintext a single GCM invocation accepts (2^36 - 32 bytes)
pub const GCM_MAX_PLAINTEXT: u64 = (1 << 36) - 32;

/// Encrypt a buffer with a fresh random IV.
pub fn encrypt_bytes(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<BinaryEnvelope> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    // A new IV for every call; never derived from a counter or retried value
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CryptoError::UnsupportedSize {
            len: plaintext.len() as u64,
            max: GCM_MAX_PLAINTEXT,
        })?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(BinaryEnvelope {
        ciphertext: buffer,
        iv,
        tag: tag_bytes,
    })
}

/// Decrypt a detached ciphertext.
///
/// `iv` and `tag` are slices so that lengths read from transport metadata are
/// checked here: a wrong size is a [`CryptoError::MalformedEnvelope`], a tag
/// that does not verify is [`CryptoError::AuthenticationFailure`]. No
/// plaintext is released on failure.
pub fn decrypt_bytes(
    key: &DerivedKey,
    ciphertext: &[u8],
    iv: &[u8],
    tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::MalformedEnvelope(format!(
            "iv must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::MalformedEnvelope(format!(
            "tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let mut buffer = ciphertext.to_vec();

    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(iv),
        b"",
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CryptoError::AuthenticationFailure)
        }
    }
}

/// Decrypt a [`BinaryEnvelope`].
pub fn decrypt_envelope(key: &DerivedKey, envelope: &BinaryEnvelope) -> CryptoResult<Vec<u8>> {
    decrypt_bytes(key, &envelope.ciphertext, &envelope.iv, &envelope.tag)
}

//! Text message encryption: UTF-8 string ⇄ `iv:tag:ciphertext` envelope

use zeroize::Zeroize;

use crate::binary::{decrypt_bytes, encrypt_bytes};
use crate::codec::{decode_text, encode_text};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;

/// Encrypt a message. Always returns exactly three colon-separated segments.
pub fn encrypt_text(key: &DerivedKey, plaintext: &str) -> CryptoResult<String> {
    let sealed = encrypt_bytes(key, plaintext.as_bytes())?;
    Ok(encode_text(&sealed.iv, &sealed.tag, &sealed.ciphertext))
}

/// Decrypt a message envelope.
///
/// Callers showing the outcome to a user should use
/// [`CryptoError::user_message`] rather than the variant.
pub fn decrypt_text(key: &DerivedKey, envelope: &str) -> CryptoResult<String> {
    let decoded = decode_text(envelope)?;
    let plaintext = decrypt_bytes(key, &decoded.ciphertext, &decoded.iv, &decoded.tag)?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CryptoError::MalformedEnvelope("decrypted payload is not UTF-8".into())
    })
}

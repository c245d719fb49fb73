use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures of the encryption subsystem. All of them are recoverable at the
/// call site.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Salt undecodable or KDF parameters unusable; prompt for the password again
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Envelope framing is wrong: segment count, base64, IV/tag length
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// GCM tag did not verify: wrong key or tampered data
    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailure,

    /// Payload exceeds the configured upload ceiling
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    UnsupportedSize { len: u64, max: u64 },

    /// Session key storage could not be read or written
    #[error("key store error: {0}")]
    KeyStore(String),
}

impl CryptoError {
    /// True for the failures a reader sees as "cannot decrypt"
    pub fn is_decrypt_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::MalformedEnvelope(_) | CryptoError::AuthenticationFailure
        )
    }

    /// Text safe to show an end user. Decryption failures collapse to one
    /// message so the UI never reveals which check failed.
    pub fn user_message(&self) -> &'static str {
        match self {
            CryptoError::MalformedEnvelope(_) | CryptoError::AuthenticationFailure => {
                "cannot decrypt: check your password"
            }
            CryptoError::KeyDerivation(_) => "could not unlock: enter your password again",
            CryptoError::UnsupportedSize { .. } => "file is too large to send",
            CryptoError::KeyStore(_) => "session key unavailable: unlock again",
        }
    }
}

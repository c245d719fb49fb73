//! Key derivation: PBKDF2-HMAC-SHA256 password + account salt → AES-256 key

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit AES-GCM key derived from the user's password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the raw key bytes as standard base64 (session storage format).
    pub fn export_base64(&self) -> String {
        B64.encode(self.bytes)
    }

    /// Re-import a key produced by [`DerivedKey::export_base64`].
    pub fn import_base64(encoded: &str) -> CryptoResult<Self> {
        let mut raw = B64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyStore(format!("exported key is not base64: {e}")))?;

        if raw.len() != KEY_SIZE {
            let len = raw.len();
            raw.zeroize();
            return Err(CryptoError::KeyStore(format!(
                "exported key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters.
///
/// Changing these invalidates every key ever derived, so each set is pinned
/// to a version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub version: u8,
    pub iterations: u32,
}

impl KdfParams {
    /// PBKDF2-HMAC-SHA256, 100,000 iterations, 32-byte output
    pub const V1: KdfParams = KdfParams {
        version: 1,
        iterations: 100_000,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::V1
    }
}

/// Generate a fresh per-account salt (16 random bytes, base64).
///
/// Created once at signup; the user store persists it and it never changes.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    B64.encode(salt)
}

/// Derive the account key from a password and the base64 account salt
/// using the pinned [`KdfParams::V1`] parameters.
pub fn derive_key(password: &SecretString, salt_b64: &str) -> CryptoResult<DerivedKey> {
    derive_key_with(password, salt_b64, &KdfParams::V1)
}

/// Derive a key with explicit parameters.
pub fn derive_key_with(
    password: &SecretString,
    salt_b64: &str,
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be non-zero".into(),
        ));
    }

    let salt = B64
        .decode(salt_b64.trim())
        .map_err(|e| CryptoError::KeyDerivation(format!("salt is not valid base64: {e}")))?;
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt is empty".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        &salt,
        params.iterations,
        &mut key,
    );

    tracing::debug!(
        kdf_version = params.version,
        iterations = params.iterations,
        "derived account key"
    );

    Ok(DerivedKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast params for testing; the pinned V1 set is covered by the scenario tests
    const FAST: KdfParams = KdfParams {
        version: 1,
        iterations: 1_000,
    };

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-password-123");
        let salt = "dGVzdHNhbHQ=";

        let key1 = derive_key_with(&password, salt, &FAST).unwrap();
        let key2 = derive_key_with(&password, salt, &FAST).unwrap();

        assert_eq!(
            key1.as_bytes(),
            key2.as_bytes(),
            "KDF must be deterministic"
        );
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = "dGVzdHNhbHQ=";

        let key1 = derive_key_with(&SecretString::from("password-a"), salt, &FAST).unwrap();
        let key2 = derive_key_with(&SecretString::from("password-b"), salt, &FAST).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different passwords must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-password");

        let key1 = derive_key_with(&password, &generate_salt(), &FAST).unwrap();
        let key2 = derive_key_with(&password, &generate_salt(), &FAST).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_pbkdf2_sha256_known_answer() {
        // RFC 7914 §11 PBKDF2-HMAC-SHA256 vector: P="passwd", S="salt", c=1
        let password = SecretString::from("passwd");
        let params = KdfParams {
            version: 1,
            iterations: 1,
        };
        let key = derive_key_with(&password, &B64.encode(b"salt"), &params).unwrap();

        assert_eq!(
            hex::encode(key.as_bytes()),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_invalid_salt_rejected() {
        let password = SecretString::from("pw");
        let err = derive_key_with(&password, "not base64!!", &FAST).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn test_empty_salt_rejected() {
        let password = SecretString::from("pw");
        let err = derive_key_with(&password, "", &FAST).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let password = SecretString::from("pw");
        let params = KdfParams {
            version: 1,
            iterations: 0,
        };
        let err = derive_key_with(&password, "dGVzdHNhbHQ=", &params).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn test_generated_salt_shape() {
        let salt = generate_salt();
        assert_eq!(B64.decode(&salt).unwrap().len(), SALT_SIZE);
        assert_ne!(salt, generate_salt(), "salts must be random");
    }

    #[test]
    fn test_export_import_roundtrip() {
        let key = DerivedKey::from_bytes([7u8; KEY_SIZE]);
        let restored = DerivedKey::import_base64(&key.export_base64()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn test_import_wrong_length() {
        let err = DerivedKey::import_base64(&B64.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, CryptoError::KeyStore(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = DerivedKey::from_bytes([0xAB; KEY_SIZE]);
        let shown = format!("{key:?}");
        assert!(shown.contains("REDACTED"));
        assert!(!shown.contains("171"));
    }
}

//! courier-crypto: client-side E2E encryption for user/agent conversations
//!
//! The server only ever stores opaque envelopes; key material and plaintext
//! stay on the client.
//!
//! Pipeline:
//! ```text
//! password + salt ──PBKDF2-HMAC-SHA256 (100k)──▶ DerivedKey ──▶ KeyStore (session)
//!                                                    │
//!              text ──AES-256-GCM──▶ b64(iv):b64(tag):b64(ciphertext)
//!             bytes ──AES-256-GCM──▶ ciphertext body + ivBase64/authTagBase64 metadata
//! ```
//!
//! Stored content predating encryption is told apart from envelopes by
//! [`classify::looks_like_envelope`] and rendered through [`render::render_text`],
//! which never fails and degrades to a placeholder.

pub mod attachment;
pub mod binary;
pub mod classify;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod keystore;
pub mod limits;
pub mod message;
pub mod render;

pub use attachment::{open_attachment, seal_attachment, ImageDimensions};
pub use binary::{decrypt_bytes, decrypt_envelope, encrypt_bytes};
pub use classify::{looks_like_envelope, Classifier};
pub use codec::{decode_text, encode_text, BinaryEnvelope, TextEnvelope};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, derive_key_with, generate_salt, DerivedKey, KdfParams};
pub use keystore::{FileBackend, KeyStore, MemoryBackend, SessionBackend};
pub use limits::SizeLimits;
pub use message::{decrypt_text, encrypt_text};
pub use render::{render_text, Rendered};

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;

/// Size of a freshly generated account salt
pub const SALT_SIZE: usize = 16;

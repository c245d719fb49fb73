use serde::{Deserialize, Serialize};

/// What kind of payload an upload carries; selects the size ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Inline image rendered in the conversation
    Image,
    /// Any other attached document
    File,
}

impl PayloadKind {
    /// Image attachments are the ones that carry pixel dimensions
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            PayloadKind::Image
        } else {
            PayloadKind::File
        }
    }
}

/// Non-secret transport fields that travel next to an encrypted attachment body.
///
/// The body itself is the raw ciphertext; IV and tag ride along here as base64
/// so large payloads are never base64-inflated end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    /// 12-byte AES-GCM IV, base64
    pub iv_base64: String,
    /// 16-byte AES-GCM tag, base64
    pub auth_tag_base64: String,
    /// MIME type of the plaintext
    pub content_type: String,
    /// Length of the body in bytes (equal for plaintext and ciphertext)
    pub byte_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// SHA-256 of the ciphertext body, 64 lowercase hex chars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl AttachmentMeta {
    pub fn kind(&self) -> PayloadKind {
        PayloadKind::from_content_type(&self.content_type)
    }
}

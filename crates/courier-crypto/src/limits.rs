//! Upload size ceilings, checked by the calling layer before encryption

use courier_core::config::LimitsConfig;
use courier_core::types::PayloadKind;

use crate::error::{CryptoError, CryptoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_image_bytes: u64,
    pub max_file_bytes: u64,
}

impl SizeLimits {
    pub fn max_for(&self, kind: PayloadKind) -> u64 {
        match kind {
            PayloadKind::Image => self.max_image_bytes,
            PayloadKind::File => self.max_file_bytes,
        }
    }

    /// Reject a payload larger than the ceiling for its kind.
    pub fn check(&self, kind: PayloadKind, len: u64) -> CryptoResult<()> {
        let max = self.max_for(kind);
        if len > max {
            tracing::debug!(?kind, len, max, "payload rejected by size limit");
            return Err(CryptoError::UnsupportedSize { len, max });
        }
        Ok(())
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for SizeLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_file_bytes: config.max_file_bytes,
        }
    }
}

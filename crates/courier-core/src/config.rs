use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CourierError, CourierResult};

/// Top-level client configuration (loaded from courier.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub log: LogConfig,
    pub session: SessionConfig,
    pub limits: LimitsConfig,
    pub classifier: ClassifierConfig,
}

impl CourierConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CourierResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| CourierError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info); RUST_LOG overrides
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the session key file.
    /// Defaults to $XDG_RUNTIME_DIR/courier, which is cleared at logout.
    pub dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Resolve the session directory: config > $XDG_RUNTIME_DIR > temp dir
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        match std::env::var_os("XDG_RUNTIME_DIR") {
            Some(runtime) => PathBuf::from(runtime).join("courier"),
            None => std::env::temp_dir().join("courier-session"),
        }
    }
}

/// Upload ceilings enforced before encryption is attempted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inline image size in bytes (default: 5 MiB)
    pub max_image_bytes: u64,
    /// Maximum general file size in bytes (default: 20 MiB)
    pub max_file_bytes: u64,
}

/// Tuning for the legacy plaintext/envelope heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Entropy ceiling in bits per character (default: 5.0)
    pub entropy_threshold: f64,
    /// Fraction of log2(len) used as the ceiling for short inputs (default: 0.7)
    pub short_input_ratio: f64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: 5.0,
            short_input_ratio: 0.7,
        }
    }
}

//! courier: client-side encryption for user/agent conversations
//!
//! Session commands:
//!   salt                      - print a fresh account salt
//!   unlock --salt <b64>       - derive the key from your password and keep it for this session
//!   lock                      - forget the session key
//!   status                    - show whether a session key is present
//!
//! Content commands (use the session key):
//!   encrypt [TEXT]            - text → envelope
//!   decrypt [ENVELOPE]        - envelope → text
//!   seal <file> --out <path>  - encrypt an attachment, writes <path>.meta.json
//!   open <file> --meta <json> --out <path>
//!   classify [TEXT]           - envelope or plaintext?
//!   render [TEXT]             - show stored content, placeholder if undecryptable

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use courier_core::config::CourierConfig;
use courier_core::types::{AttachmentMeta, PayloadKind};
use courier_crypto::{
    decrypt_text, derive_key, encrypt_text, generate_salt, open_attachment, render::render_with,
    seal_attachment, Classifier, CryptoError, DerivedKey, FileBackend, ImageDimensions, KeyStore,
    SizeLimits,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "End-to-end encryption for messages and attachments",
    long_about = "courier: encrypt and decrypt conversation content with a password-derived session key"
)]
struct Cli {
    /// Path to courier.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "COURIER_CONFIG",
        default_value = "~/.config/courier/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "COURIER_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "COURIER_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a new random account salt (base64)
    Salt,

    /// Derive the key from your password and store it for this session
    ///
    /// The password is read from COURIER_PASSWORD if set, otherwise prompted.
    Unlock {
        /// Account salt (base64), as issued at signup
        #[arg(long, env = "COURIER_SALT")]
        salt: String,
    },

    /// Clear the session key
    Lock,

    /// Show whether a session key is present
    Status,

    /// Encrypt a text message (reads stdin if TEXT is omitted)
    Encrypt { text: Option<String> },

    /// Decrypt a text envelope (reads stdin if ENVELOPE is omitted)
    Decrypt { envelope: Option<String> },

    /// Encrypt an attachment
    Seal {
        /// Plaintext file
        file: PathBuf,
        /// Where to write the ciphertext body; metadata goes to <out>.meta.json
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// MIME type of the file (default: guessed from the extension)
        #[arg(long)]
        content_type: Option<String>,
        /// Image width in pixels
        #[arg(long, requires = "height")]
        width: Option<u32>,
        /// Image height in pixels
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Decrypt an attachment
    Open {
        /// Ciphertext body
        file: PathBuf,
        /// Metadata JSON written by `seal` (default: <file>.meta.json)
        #[arg(long, short = 'm')]
        meta: Option<PathBuf>,
        /// Where to write the plaintext
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Report whether stored content looks like an envelope
    Classify { text: Option<String> },

    /// Render stored content the way a conversation view would
    ///
    /// With no TEXT, every stdin line is rendered.
    Render { text: Option<String> },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}


// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = CourierConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, format);

    let session = session_store(&config);
    let limits = SizeLimits::from(&config.limits);

    let output = match cli.command {
        Commands::Salt => generate_salt(),
        Commands::Unlock { salt } => cmd_unlock(&session, &read_password()?, &salt)?,
        Commands::Lock => cmd_lock(&session)?,
        Commands::Status => cmd_status(&session),
        Commands::Encrypt { text } => cmd_encrypt(&session, text).await?,
        Commands::Decrypt { envelope } => cmd_decrypt(&session, envelope).await?,
        Commands::Seal {
            file,
            out,
            content_type,
            width,
            height,
        } => {
            let dimensions = match (width, height) {
                (Some(width), Some(height)) => Some(ImageDimensions { width, height }),
                _ => None,
            };
            let content_type = content_type.as_deref();
            cmd_seal(&session, &limits, &file, &out, content_type, dimensions).await?
        }
        Commands::Open { file, meta, out } => {
            cmd_open(&session, &file, meta.as_deref(), &out).await?
        }
        Commands::Classify { text } => cmd_classify(&config, text).await?,
        Commands::Render { text } => cmd_render(&session, &config, text).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&config, &config_path)?,
        },
    };
    println!("{output}");
    Ok(())
}

// ── Config, logging, session ──────────────────────────────────────────────────

/// Logs go to stderr; stdout carries envelopes and plaintext.
fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn session_store(config: &CourierConfig) -> KeyStore<FileBackend> {
    let dir = expand_tilde(&config.session.resolve_dir());
    KeyStore::new(FileBackend::in_dir(&dir))
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

fn require_key(session: &KeyStore<FileBackend>) -> Result<DerivedKey> {
    session
        .retrieve()
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?
        .context("session is locked: run `courier unlock` first")
}

/// Argument if given, else all of stdin without the trailing newline
async fn arg_or_stdin(arg: Option<String>) -> Result<String> {
    if let Some(value) = arg {
        return Ok(value);
    }
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("reading stdin")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

// ── `courier unlock` / `lock` / `status` ──────────────────────────────────────

fn cmd_unlock(
    session: &KeyStore<FileBackend>,
    password: &SecretString,
    salt: &str,
) -> Result<String> {
    let key = derive_key(password, salt).map_err(|e| {
        tracing::debug!(error = %e, "key derivation failed");
        anyhow::anyhow!("{}", e.user_message())
    })?;
    session.store(&key).context("storing session key")?;

    tracing::info!(path = %session.backend().path().display(), "session unlocked");
    Ok("unlocked".to_string())
}

fn read_password() -> Result<SecretString> {
    if let Ok(password) = std::env::var("COURIER_PASSWORD") {
        return Ok(SecretString::from(password));
    }
    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    Ok(SecretString::from(password))
}

fn cmd_lock(session: &KeyStore<FileBackend>) -> Result<String> {
    session.clear().context("clearing session key")?;
    tracing::info!("session locked");
    Ok("locked".to_string())
}

fn cmd_status(session: &KeyStore<FileBackend>) -> String {
    let unlocked = session.is_unlocked().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "session key unreadable");
        false
    });
    let state = if unlocked { "unlocked" } else { "locked" };
    let path = session.backend().path().display();
    format!("session:  {state}\nkey file: {path}")
}

// ── `courier encrypt` / `decrypt` ─────────────────────────────────────────────

async fn cmd_encrypt(session: &KeyStore<FileBackend>, text: Option<String>) -> Result<String> {
    let key = require_key(session)?;
    let plaintext = arg_or_stdin(text).await?;
    encrypt_text(&key, &plaintext).context("encrypting message")
}

async fn cmd_decrypt(session: &KeyStore<FileBackend>, envelope: Option<String>) -> Result<String> {
    let key = require_key(session)?;
    let envelope = arg_or_stdin(envelope).await?;
    decrypt_text(&key, envelope.trim()).map_err(decrypt_error)
}

/// Every decryption failure reads the same to the user; detail goes to logs
fn decrypt_error(e: CryptoError) -> anyhow::Error {
    if e.is_decrypt_failure() {
        tracing::debug!(error = %e, "decryption failed");
    } else {
        tracing::warn!(error = %e, "could not decrypt");
    }
    anyhow::anyhow!("{}", e.user_message())
}

// ── `courier seal` / `open` ───────────────────────────────────────────────────

async fn cmd_seal(
    session: &KeyStore<FileBackend>,
    limits: &SizeLimits,
    file: &Path,
    out: &Path,
    content_type: Option<&str>,
    dimensions: Option<ImageDimensions>,
) -> Result<String> {
    let key = require_key(session)?;
    let content_type = content_type.map_or_else(|| guess_content_type(file), str::to_string);
    let kind = PayloadKind::from_content_type(&content_type);

    // Reject oversized uploads before reading them into memory
    let len = tokio::fs::metadata(file)
        .await
        .with_context(|| format!("inspecting {}", file.display()))?
        .len();
    limits
        .check(kind, len)
        .map_err(|e| anyhow::anyhow!("{}: {e}", file.display()))?;

    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let sealed = seal_attachment(&key, &body, &content_type, dimensions);
    let (ciphertext, meta) = sealed.context("encrypting attachment")?;

    let meta_path = meta_path_for(out);
    tokio::fs::write(out, &ciphertext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    let meta_json = serde_json::to_string_pretty(&meta).context("serializing metadata")?;
    tokio::fs::write(&meta_path, meta_json)
        .await
        .with_context(|| format!("writing {}", meta_path.display()))?;

    tracing::info!(
        file = %file.display(),
        bytes = meta.byte_length,
        content_type = %meta.content_type,
        "sealed attachment"
    );
    let body_line = format!("{} ({})", out.display(), fmt_bytes(meta.byte_length));
    Ok(format!("{body_line}\n{}", meta_path.display()))
}

async fn cmd_open(
    session: &KeyStore<FileBackend>,
    file: &Path,
    meta: Option<&Path>,
    out: &Path,
) -> Result<String> {
    let key = require_key(session)?;
    let meta_path = meta.map_or_else(|| meta_path_for(file), Path::to_path_buf);

    let meta_json = tokio::fs::read_to_string(&meta_path)
        .await
        .with_context(|| format!("reading {}", meta_path.display()))?;
    let meta: AttachmentMeta = serde_json::from_str(&meta_json)
        .with_context(|| format!("parsing {}", meta_path.display()))?;
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let plaintext = open_attachment(&key, body, &meta).map_err(decrypt_error)?;
    tokio::fs::write(out, &plaintext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    tracing::info!(file = %file.display(), kind = ?meta.kind(), "opened attachment");
    let opened = out.display();
    let size = fmt_bytes(plaintext.len() as u64);
    Ok(format!("{opened} ({}, {size})", meta.content_type))
}

fn meta_path_for(body: &Path) -> PathBuf {
    let mut name = body.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

fn guess_content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
    .to_string()
}

// ── `courier classify` / `render` ─────────────────────────────────────────────

async fn cmd_classify(config: &CourierConfig, text: Option<String>) -> Result<String> {
    let classifier = Classifier::new(&config.classifier);
    let text = arg_or_stdin(text).await?;
    let verdict = match classifier.looks_like_envelope(&text) {
        true => "envelope",
        false => "plaintext",
    };
    Ok(verdict.to_string())
}

async fn cmd_render(
    session: &KeyStore<FileBackend>,
    config: &CourierConfig,
    text: Option<String>,
) -> Result<String> {
    let classifier = Classifier::new(&config.classifier);
    // A locked or unreadable session still renders: envelopes become placeholders
    let key = session.retrieve().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "session key unreadable; rendering without it");
        None
    });

    let input = arg_or_stdin(text).await?;
    let lines: Vec<String> = input
        .lines()
        .map(|line| render_with(&classifier, key.as_ref(), line))
        .map(|rendered| rendered.to_string())
        .collect();
    Ok(lines.join("\n"))
}

// ── `courier config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &CourierConfig, config_path: &Path) -> Result<String> {
    let path = config_path.display();
    let header = if config_path.exists() {
        format!("# Configuration from: {path}")
    } else {
        format!("# Configuration: defaults (no file at {path})")
    };
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    Ok(format!("{header}\n\n{}", rendered.trim_end()))
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

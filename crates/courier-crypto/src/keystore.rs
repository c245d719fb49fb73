//! Session-scoped holder of the derived key
//!
//! One slot per session. `store` replaces whatever was there, `clear` empties
//! it. The backend only ever sees the base64 export of the key, never a
//! password, and lives no longer than the login session.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;

/// Where the exported key lives between reloads of the same session
pub trait SessionBackend: Send + Sync {
    fn load(&self) -> CryptoResult<Option<Zeroizing<String>>>;
    fn save(&self, exported: &str) -> CryptoResult<()>;
    fn remove(&self) -> CryptoResult<()>;
}

/// Process-local backend; the key is gone when the process exits
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<Zeroizing<String>>>,
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> CryptoResult<Option<Zeroizing<String>>> {
        Ok(lock(&self.slot).clone())
    }

    fn save(&self, exported: &str) -> CryptoResult<()> {
        *lock(&self.slot) = Some(Zeroizing::new(exported.to_string()));
        Ok(())
    }

    fn remove(&self) -> CryptoResult<()> {
        lock(&self.slot).take();
        Ok(())
    }
}

/// Single owner-only file, normally under `$XDG_RUNTIME_DIR` so that it is
/// dropped at logout.
///
/// The directory holding it must belong to the current user and grant no
/// group or other access. Anything else is refused rather than trusted.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// File name of the session key inside the session directory
    pub const FILE_NAME: &'static str = "session.key";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Check the session directory; `Ok(false)` when it does not exist yet.
    fn check_dir(&self) -> CryptoResult<bool> {
        let dir = self.dir();
        match fs::symlink_metadata(dir) {
            Ok(meta) => verify_private_dir(dir, &meta).map(|()| true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(keystore_error("inspecting", dir, e)),
        }
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> CryptoResult<Option<Zeroizing<String>>> {
        if !self.check_dir()? {
            return Ok(None);
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(Zeroizing::new(content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(keystore_error("reading", &self.path, e)),
        }
    }

    fn save(&self, exported: &str) -> CryptoResult<()> {
        let dir = self.dir();
        if !self.check_dir()? {
            create_private_dir(dir)?;
        }

        // The temp file is created exclusively with mode 0600, and persisting
        // renames it over the target instead of writing through it.
        let mut tmp = tempfile::Builder::new()
            .prefix(".session")
            .tempfile_in(dir)
            .map_err(|e| keystore_error("creating temp file in", dir, e))?;
        tmp.write_all(exported.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| keystore_error("writing", tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| keystore_error("installing", &self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), "stored session key");
        Ok(())
    }

    fn remove(&self) -> CryptoResult<()> {
        if !self.check_dir()? {
            return Ok(());
        }
        let len = match fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_file() => meta.len() as usize,
            Ok(_) => 0,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(keystore_error("inspecting", &self.path, e)),
        };

        // Best effort overwrite before unlink; the unlink is what counts
        if len > 0 {
            if let Err(e) = fs::write(&self.path, vec![0u8; len]) {
                tracing::debug!(error = %e, "could not overwrite session key before removal");
            }
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed session key");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(keystore_error("removing", &self.path, e)),
        }
    }
}

/// Session key lifecycle: store, retrieve, clear.
///
/// Owned by whatever represents the session; there is no global instance.
pub struct KeyStore<B: SessionBackend> {
    backend: B,
    slot: Mutex<Option<DerivedKey>>,
}

impl KeyStore<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }
}

impl<B: SessionBackend> KeyStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slot: Mutex::new(None),
        }
    }

    /// Replace the session key.
    ///
    /// The backend is written first; if that fails the previous key stays in
    /// place.
    pub fn store(&self, key: &DerivedKey) -> CryptoResult<()> {
        let exported = Zeroizing::new(key.export_base64());
        self.backend.save(&exported)?;
        *lock(&self.slot) = Some(key.clone());
        Ok(())
    }

    /// The current session key, restoring it from the backend after a reload.
    pub fn retrieve(&self) -> CryptoResult<Option<DerivedKey>> {
        let mut slot = lock(&self.slot);
        if let Some(key) = slot.as_ref() {
            return Ok(Some(key.clone()));
        }

        let Some(exported) = self.backend.load()? else {
            return Ok(None);
        };
        let key = DerivedKey::import_base64(&exported)?;
        *slot = Some(key.clone());
        Ok(Some(key))
    }

    /// Forget the session key. `retrieve` returns `None` afterwards.
    ///
    /// The backend entry goes first; if removing it fails the in-memory key
    /// is kept so both sides still agree.
    pub fn clear(&self) -> CryptoResult<()> {
        self.backend.remove()?;
        // Dropping the DerivedKey zeroizes it
        lock(&self.slot).take();
        Ok(())
    }

    pub fn is_unlocked(&self) -> CryptoResult<bool> {
        Ok(self.retrieve()?.is_some())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn keystore_error(action: &str, path: &Path, e: io::Error) -> CryptoError {
    CryptoError::KeyStore(format!("{action} {}: {e}", path.display()))
}

/// Create the session directory owner-only. Parents are created as usual;
/// the directory itself must not appear in the meantime.
fn create_private_dir(dir: &Path) -> CryptoResult<()> {
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| keystore_error("creating", parent, e))?;
    }

    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .map_err(|e| keystore_error("creating", dir, e))
}

#[cfg(unix)]
fn verify_private_dir(dir: &Path, meta: &fs::Metadata) -> CryptoResult<()> {
    use std::os::unix::fs::MetadataExt;

    let uid = unsafe { libc::getuid() };
    if !meta.is_dir() || meta.uid() != uid || meta.mode() & 0o077 != 0 {
        return Err(CryptoError::KeyStore(format!(
            "refusing {}: session directory must be owned by uid {uid} with mode 0700",
            dir.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn verify_private_dir(dir: &Path, meta: &fs::Metadata) -> CryptoResult<()> {
    if meta.is_dir() {
        return Ok(());
    }
    let msg = format!("refusing {}: not a directory", dir.display());
    Err(CryptoError::KeyStore(msg))
}

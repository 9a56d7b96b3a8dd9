//! # Key Stores
//!
//! [`KeyMaterialStore`] implementations.
//!
//! ## File Layout
//!
//! ```text
//! <key_dir>/                      (0700 on unix)
//! ├── alice.jwk                   (0600, private JWK text)
//! └── bob.jwk
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a crash never leaves a truncated key behind.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use zeroize::Zeroizing;

use super::KeyMaterialStore;
use crate::error::{Error, Result};

const KEY_FILE_EXTENSION: &str = "jwk";
const MAX_IDENTITY_LEN: usize = 128;

// ============================================================================
// MEMORY
// ============================================================================

/// In-memory key store
///
/// Holds the key for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryKeyStore {
    key: RwLock<Option<Zeroizing<String>>>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("populated", &self.key.read().is_some())
            .finish()
    }
}

impl KeyMaterialStore for MemoryKeyStore {
    fn save(&self, private_key_text: &str) -> Result<()> {
        *self.key.write() = Some(Zeroizing::new(private_key_text.to_string()));
        Ok(())
    }

    fn load(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(self.key.read().clone())
    }

    fn erase(&self) -> Result<()> {
        self.key.write().take();
        Ok(())
    }
}

// ============================================================================
// FILE
// ============================================================================

/// File-backed key store: one key file per local identity
#[derive(Debug)]
pub struct FileKeyStore {
    dir: PathBuf,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyStore {
    /// Open the store for `identity` under `dir`
    ///
    /// The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>, identity: &str) -> Result<Self> {
        validate_identity(identity)?;

        let dir = dir.into();
        let path = dir.join(format!("{}.{}", identity, KEY_FILE_EXTENSION));

        Ok(Self {
            dir,
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the key file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!(".{}.tmp", name))
    }

    fn write_atomically(&self, contents: &str) -> std::io::Result<()> {
        create_private_dir(&self.dir)?;

        let temp = self.temp_path();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let result = options.open(&temp).and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        });

        match result.and_then(|()| fs::rename(&temp, &self.path)) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&temp);
                Err(e)
            }
        }
    }
}

impl KeyMaterialStore for FileKeyStore {
    fn save(&self, private_key_text: &str) -> Result<()> {
        let _guard = self.write_lock.lock();

        self.write_atomically(private_key_text).map_err(|e| {
            Error::StorageWriteError(format!("{}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), "Private key saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Zeroizing<String>>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(Zeroizing::new(text))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn erase(&self) -> Result<()> {
        let _guard = self.write_lock.lock();

        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Private key erased");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageWriteError(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Identities become file names, so only a conservative character set is allowed.
fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(Error::InvalidIdentity(format!(
            "identity must be 1-{} characters",
            MAX_IDENTITY_LEN
        )));
    }

    if identity.starts_with('.') {
        return Err(Error::InvalidIdentity(
            "identity must not start with '.'".into(),
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@');
    if let Some(bad) = identity.chars().find(|c| !allowed(*c)) {
        return Err(Error::InvalidIdentity(format!(
            "identity contains unsupported character {:?}",
            bad
        )));
    }

    Ok(())
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_TEXT: &str = r#"{"kty":"RSA","d":"c2VjcmV0"}"#;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryKeyStore::new();
        assert!(store.load().unwrap().is_none());
        assert!(!store.contains().unwrap());

        store.save(KEY_TEXT).unwrap();
        assert_eq!(store.load().unwrap().as_deref().map(String::as_str), Some(KEY_TEXT));
        assert!(store.contains().unwrap());

        store.erase().unwrap();
        assert!(store.load().unwrap().is_none());

        // Erasing twice is fine
        store.erase().unwrap();
    }

    #[test]
    fn test_memory_store_debug_hides_key() {
        let store = MemoryKeyStore::new();
        store.save(KEY_TEXT).unwrap();
        assert!(!format!("{:?}", store).contains("c2VjcmV0"));
    }

    #[test]
    fn test_file_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys"), "alice").unwrap();

        assert!(store.load().unwrap().is_none());
        store.erase().unwrap();

        store.save(KEY_TEXT).unwrap();
        assert_eq!(store.load().unwrap().as_deref().map(String::as_str), Some(KEY_TEXT));
        assert!(store.path().ends_with("keys/alice.jwk"));

        store.save("replacement").unwrap();
        assert_eq!(store.load().unwrap().as_deref().map(String::as_str), Some("replacement"));

        store.erase().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path(), "alice").unwrap();
        store.save(KEY_TEXT).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["alice.jwk".to_string()]);
    }

    #[test]
    fn test_file_store_identities_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let alice = FileKeyStore::new(dir.path(), "alice").unwrap();
        let bob = FileKeyStore::new(dir.path(), "bob").unwrap();

        alice.save(KEY_TEXT).unwrap();
        assert!(bob.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys"), "alice").unwrap();
        store.save(KEY_TEXT).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_invalid_identities_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for identity in ["", "../evil", "a/b", ".hidden", "with space"] {
            assert!(
                matches!(
                    FileKeyStore::new(dir.path(), identity),
                    Err(Error::InvalidIdentity(_))
                ),
                "accepted {:?}",
                identity
            );
        }
        assert!(FileKeyStore::new(dir.path(), "bob.smith@example.org").is_ok());
    }
}

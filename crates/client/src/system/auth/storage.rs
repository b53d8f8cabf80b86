use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Token store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque credential store capability
///
/// Implementations decide where the bearer token lives (memory, file, OS keychain).
pub trait TokenStore: Send + Sync {
    fn save(&self, token: &str) -> Result<(), TokenStoreError>;
    fn load(&self) -> Result<Option<String>, TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;

    /// Clear the stored token only if it still equals `token`, as one atomic step.
    ///
    /// Returns `true` when this call removed it.
    fn clear_if(&self, token: &str) -> Result<bool, TokenStoreError>;
}

/// Token kept in process memory only
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.token.lock().clone())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.lock() = None;
        Ok(())
    }

    fn clear_if(&self, token: &str) -> Result<bool, TokenStoreError> {
        let mut guard = self.token.lock();
        if guard.as_deref() == Some(token) {
            *guard = None;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Сериализует запись и сравнение-с-удалением файловых токенов внутри процесса
static FILE_STORE_LOCK: Mutex<()> = Mutex::new(());

/// Token persisted to a single file (owner-only permissions on Unix)
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn remove_file(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, token: &str) -> Result<(), TokenStoreError> {
        use std::io::Write;

        let _guard = FILE_STORE_LOCK.lock();
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| self.io_error(e))?;
        file.write_all(token.as_bytes())
            .map_err(|e| self.io_error(e))?;
        tracing::debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, TokenStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let _guard = FILE_STORE_LOCK.lock();
        self.remove_file()
    }

    fn clear_if(&self, token: &str) -> Result<bool, TokenStoreError> {
        let _guard = FILE_STORE_LOCK.lock();
        if self.load()?.as_deref() != Some(token) {
            return Ok(false);
        }
        self.remove_file()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_store_save_load_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token"));

        assert_eq!(store.load().unwrap(), None);
        store.save("token-1").unwrap();
        store.save("token-2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("token-2"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // повторная очистка не ошибка
        store.clear().unwrap();
    }

    #[test]
    fn test_clear_if_only_removes_matching_token() {
        let dir = tempfile::tempdir().unwrap();
        let stores: Vec<Box<dyn TokenStore>> = vec![
            Box::new(MemoryTokenStore::new()),
            Box::new(FileTokenStore::new(dir.path().join("token"))),
        ];

        for store in stores {
            store.save("current").unwrap();
            assert!(!store.clear_if("stale").unwrap());
            assert_eq!(store.load().unwrap().as_deref(), Some("current"));

            assert!(store.clear_if("current").unwrap());
            assert!(!store.clear_if("current").unwrap());
            assert_eq!(store.load().unwrap(), None);
        }
    }

    #[test]
    fn test_clear_if_is_exclusive_across_threads() {
        let store = Arc::new(MemoryTokenStore::with_token("shared"));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.clear_if("shared").unwrap()
                })
            })
            .collect();

        let cleared = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|cleared| *cleared)
            .count();
        assert_eq!(cleared, 1);
    }

    #[test]
    fn test_file_store_ignores_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(FileTokenStore::new(path).load().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));
        store.save("secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

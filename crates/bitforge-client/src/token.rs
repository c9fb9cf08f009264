//! Persisted bearer token storage
//!
//! The token is issued and validated by the backend; the client only keeps it
//! between runs and attaches it to requests.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage for the session bearer token
pub trait TokenStore: Send + Sync {
    /// Current token, if any
    fn load(&self) -> Option<String>;

    /// Persist a freshly issued token
    fn save(&self, token: &str) -> Result<()>;

    /// Forget the token (logout, rejected token)
    fn clear(&self) -> Result<()>;
}

/// In-memory token store, nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| ClientError::TokenStore("token lock poisoned".into()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| ClientError::TokenStore("token lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Token store backed by `session.json` in the data directory.
///
/// Writes go to a temp file first and are renamed into place.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileTokenStore {
    pub const FILE_NAME: &'static str = "session.json";

    /// Open the store in `data_dir`, reading any existing token.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ClientError::TokenStore(format!("creating {}: {}", data_dir.display(), e)))?;
        let path = data_dir.join(Self::FILE_NAME);

        let cached = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<TokenFile>(&content) {
                Ok(file) => Some(file.token),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ClientError::TokenStore(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        self.cached.read().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        let body = serde_json::to_string(&TokenFile {
            token: token.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| ClientError::TokenStore(format!("writing {}: {}", self.path.display(), e)))?;

        let mut guard = self
            .cached
            .write()
            .map_err(|_| ClientError::TokenStore("token lock poisoned".into()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ClientError::TokenStore(format!(
                    "removing {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
        let mut guard = self
            .cached
            .write()
            .map_err(|_| ClientError::TokenStore("token lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.load().is_none());
        store.save("abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileTokenStore::open(dir.path()).unwrap();
            store.save("tok-1").unwrap();
        }
        let store = FileTokenStore::open(dir.path()).unwrap();
        assert_eq!(store.load().as_deref(), Some("tok-1"));

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(FileTokenStore::open(dir.path()).unwrap().load().is_none());
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(FileTokenStore::FILE_NAME), "not json").unwrap();
        let store = FileTokenStore::open(dir.path()).unwrap();
        assert!(store.load().is_none());
    }
}

/// Durable key-value backends for locally persisted application state.
///
/// Every backend stores whole string values under flat keys; there is no partial update.
/// Callers read a value, modify it in memory and write it back.
///
/// Backends:
/// - [`FileKv`]: one `{key}.json` file per key under a data directory, written atomically
/// - [`crate::redis::RedisKv`]: plain `GET`/`SET` against a Redis server
/// - [`MemoryKv`]: process-local map, used by tests
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CommonError;

pub trait KvStore: Send + Sync {
    /// Read the value under `key`. `Ok(None)` if the key has never been written.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommonError>>;

    /// Replace the value under `key`.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommonError>>;

    /// Make every completed `set` durable. Called once on shutdown.
    fn flush(&self) -> BoxFuture<'_, Result<(), CommonError>>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Keys become file names, so only a conservative character set is accepted.
pub fn validate_key(key: &str) -> Result<(), CommonError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid {
        Ok(())
    } else {
        Err(CommonError::InvalidKey(key.to_string()))
    }
}

pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace(':', "_")))
    }
}

impl KvStore for FileKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            let path = self.path_for(key);
            match tokio::fs::read_to_string(&path).await {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            tokio::fs::create_dir_all(&self.dir).await?;
            let final_path = self.path_for(key);
            let tmp_path = final_path.with_extension("json.tmp");

            write_synced(&tmp_path, value.as_bytes()).await?;
            if let Err(rename_err) = tokio::fs::rename(&tmp_path, &final_path).await {
                // Some platforms refuse to rename over an existing file.
                if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
                    tokio::fs::remove_file(&final_path).await?;
                    tokio::fs::rename(&tmp_path, &final_path).await?;
                } else {
                    return Err(rename_err.into());
                }
            }
            sync_dir(&self.dir).await?;
            debug!(path = %final_path.display(), bytes = value.len(), "kv file written");
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), CommonError>> {
        // Every set has already synced its file and the directory entry.
        Box::pin(async { Ok(()) })
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Persist the rename itself. Directories cannot be opened for syncing on every platform.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            Ok(self.entries.lock().await.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<(), CommonError>> {
        Box::pin(async move {
            validate_key(key)?;
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), CommonError>> {
        Box::pin(async { Ok(()) })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("svadharma_plans").is_ok());
        assert!(validate_key("svadharma_plans.corrupt").is_ok());
        assert!(validate_key("app:v1:plans").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a/b").is_err());
    }

    #[tokio::test]
    async fn file_kv_missing_key_reads_none() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path().join("nested"));
        assert_eq!(kv.get("svadharma_plans").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_kv_overwrites_whole_value() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path().join("nested"));

        kv.set("svadharma_plans", "[1,2,3]").await.unwrap();
        kv.set("svadharma_plans", "[]").await.unwrap();

        assert_eq!(kv.get("svadharma_plans").await.unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested").join("svadharma_plans.json").exists());
        assert!(!dir.path().join("nested").join("svadharma_plans.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_kv_replaces_leftover_temp_file() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());
        let tmp = dir.path().join("svadharma_plans.json.tmp");
        std::fs::write(&tmp, "[\"half written").unwrap();

        kv.set("svadharma_plans", r#"[{"id":"a"}]"#).await.unwrap();
        kv.flush().await.unwrap();

        assert!(!tmp.exists());
        let on_disk = std::fs::read_to_string(dir.path().join("svadharma_plans.json")).unwrap();
        assert_eq!(on_disk, r#"[{"id":"a"}]"#);
    }

    #[tokio::test]
    async fn file_kv_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());
        let err = kv.set("../outside", "x").await.unwrap_err();
        assert!(matches!(err, CommonError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn memory_kv_roundtrip() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("k").await.unwrap(), None);
        kv.set("k", "v").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
        kv.flush().await.unwrap();
        assert_eq!(kv.backend(), "memory");
    }
}

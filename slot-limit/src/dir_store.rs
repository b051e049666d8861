use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::LockError;
use crate::LockKey;
use crate::LockStore;
use crate::store::COLLECTION;

/// Lock store keeping one file per record in a shared directory.
///
/// Records live in `<root>/locks/<key>.lock`. Inserting opens the file with
/// `create_new`, which the operating system grants to exactly one caller even
/// when several processes race on the same directory. The file body names the
/// holder for diagnostics only.
///
/// There is no lease: a record left behind by a crashed holder stays until it
/// is removed by hand.
#[derive(Debug, Clone)]
pub struct DirLockStore {
    dir: PathBuf,
}

impl DirLockStore {
    /// Opens (creating if needed) the lock collection below `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, LockError> {
        let dir = root.as_ref().join(COLLECTION);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The directory holding the lock records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &LockKey) -> PathBuf {
        self.dir.join(format!("{key}.lock"))
    }
}

#[async_trait]
impl LockStore for DirLockStore {
    async fn insert_if_absent(&self, key: &LockKey) -> Result<bool, LockError> {
        let path = self.record_path(key);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let acquired_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let body = format!("{key} pid={} acquired_at={acquired_at}\n", std::process::id());
        // The record exists at this point, so the slot is ours either way.
        if let Err(e) = file.write_all(body.as_bytes()).await {
            tracing::debug!(%key, error = %e, "could not write lock holder details");
        }
        Ok(true)
    }

    async fn delete(&self, key: &LockKey) -> Result<(), LockError> {
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

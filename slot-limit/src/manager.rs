use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::LockError;
use crate::LockKey;
use crate::LockStore;

/// Hands out lock slots from a shared [`LockStore`].
///
/// Store failures never escape: an insert that fails is logged and reported as
/// a held slot, a delete that fails is logged and reported through the
/// [`ReleaseHandle`] only.
#[derive(Debug)]
pub struct LockManager<S>
where
    S: ?Sized,
{
    store: Arc<S>,
}

impl<S> Clone for LockManager<S>
where
    S: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> LockManager<S>
where
    S: LockStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Tries to take the slot named `key`.
    pub async fn try_acquire(&self, key: &LockKey) -> bool {
        match self.store.insert_if_absent(key).await {
            Ok(acquired) => {
                tracing::debug!(%key, acquired, "lock attempt");
                acquired
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "lock store insert failed; treating slot as held");
                false
            }
        }
    }

    /// Tries each key in order and returns the first one taken.
    ///
    /// Returns `None` when every slot is held.
    pub async fn acquire_any(&self, keys: &[LockKey]) -> Option<LockKey> {
        for key in keys {
            if self.try_acquire(key).await {
                return Some(key.clone());
            }
        }
        None
    }

    /// Gives the slot `key` back once `delay` has elapsed.
    ///
    /// The release runs on its own task. Dropping the returned handle detaches
    /// it; the slot is still released.
    pub fn schedule_release(&self, key: LockKey, delay: Duration) -> ReleaseHandle {
        let store = Arc::clone(&self.store);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = store.delete(&task_key).await;
            match &result {
                Ok(()) => tracing::debug!(key = %task_key, "lock released"),
                Err(e) => tracing::warn!(
                    key = %task_key,
                    error = %e,
                    "lock release failed; record may leak"
                ),
            }
            result
        });
        ReleaseHandle { key, task }
    }
}

/// A pending delayed release.
#[derive(Debug)]
pub struct ReleaseHandle {
    key: LockKey,
    task: JoinHandle<Result<(), LockError>>,
}

impl ReleaseHandle {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the release to run and returns the outcome of the delete.
    pub async fn completed(self) -> Result<(), LockError> {
        self.task
            .await
            .map_err(|e| LockError::ReleaseAborted(e.to_string()))?
    }
}

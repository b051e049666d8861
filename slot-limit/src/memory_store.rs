use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::LockError;
use crate::LockKey;
use crate::LockStore;

#[derive(Debug)]
struct Record {
    acquired_at: Instant,
}

/// In-memory lock store backed by a `HashMap<LockKey, _>` behind a `Mutex`.
///
/// Clones share the same records, so every task holding a clone contends for
/// the same slots. Records can optionally carry a lease: once a record is older
/// than the lease it no longer counts as held and the next insert reclaims it.
/// Reclaiming happens under the same mutex as the insert, so it stays atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    records: Arc<Mutex<HashMap<LockKey, Record>>>,
    lease: Option<Duration>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose records expire `lease` after they were inserted.
    pub fn with_lease(lease: Duration) -> Self {
        Self {
            records: Default::default(),
            lease: Some(lease),
        }
    }

    /// Returns `true` if a live record exists for `key`.
    pub fn is_held(&self, key: &LockKey) -> Result<bool, LockError> {
        let records = self.records()?;
        Ok(records
            .get(key)
            .is_some_and(|record| !self.expired(record, Instant::now())))
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<LockKey, Record>>, LockError> {
        self.records
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))
    }

    fn expired(&self, record: &Record, now: Instant) -> bool {
        self.lease
            .is_some_and(|lease| now.duration_since(record.acquired_at) >= lease)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn insert_if_absent(&self, key: &LockKey) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut records = self.records()?;
        match records.get(key) {
            Some(record) if !self.expired(record, now) => Ok(false),
            Some(_) => {
                tracing::warn!(%key, "reclaiming lock record after its lease expired");
                records.insert(key.clone(), Record { acquired_at: now });
                Ok(true)
            }
            None => {
                records.insert(key.clone(), Record { acquired_at: now });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &LockKey) -> Result<(), LockError> {
        self.records()?.remove(key);
        Ok(())
    }
}

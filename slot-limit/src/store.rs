use std::fmt::Debug;

use async_trait::async_trait;

use crate::LockError;
use crate::LockKey;

/// Name of the collection lock records live in.
pub(crate) const COLLECTION: &str = "locks";

/// A shared keyed collection with compare-and-insert semantics.
///
/// In-memory stores coordinate tasks of one process; shared stores (such as
/// [`DirLockStore`](crate::DirLockStore)) coordinate independent processes.
#[async_trait]
pub trait LockStore: Send + Sync + Debug {
    /// Inserts a record for `key` unless one already exists.
    ///
    /// Returns `Ok(true)` if this call created the record. Concurrent callers
    /// racing on the same key must observe exactly one `Ok(true)`.
    async fn insert_if_absent(&self, key: &LockKey) -> Result<bool, LockError>;

    /// Removes the record for `key`. Removing an absent record is not an error.
    async fn delete(&self, key: &LockKey) -> Result<(), LockError>;
}


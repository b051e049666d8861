/// Errors produced by lock stores and the lock manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The key cannot be used as a lock record identifier.
    #[error("invalid lock key {0:?}: {1}")]
    InvalidKey(String, &'static str),

    /// The store could not be reached or refused the operation.
    ///
    /// On insert this is treated exactly like a held slot. On delete the lock
    /// record may be left behind.
    #[error("lock store communication failure: {0}")]
    Store(String),

    /// The in-process state guarding a store was poisoned by a panicking thread.
    #[error("lock store poisoned: {0}")]
    Poisoned(String),

    /// A scheduled release never ran to completion.
    #[error("lock release aborted: {0}")]
    ReleaseAborted(String),
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::Store(err.to_string())
    }
}

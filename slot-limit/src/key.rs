use std::fmt;
use std::str::FromStr;

use crate::LockError;

const MAX_KEY_LEN: usize = 128;

/// Identifier of a lock slot.
///
/// The presence of a record with this key in a [`LockStore`](crate::LockStore)
/// means the slot is held. Keys are restricted to ASCII alphanumerics, `-`, `_`
/// and `.` so every store can use them verbatim (the directory store uses them
/// as file names).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(key: impl Into<String>) -> Result<Self, LockError> {
        let key = key.into();
        if key.is_empty() {
            return Err(LockError::InvalidKey(key, "must not be empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(LockError::InvalidKey(key, "longer than 128 bytes"));
        }
        if key == "." || key == ".." {
            return Err(LockError::InvalidKey(key, "reserved name"));
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(LockError::InvalidKey(
                key,
                "only ASCII alphanumerics, '-', '_' and '.' are allowed",
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LockKey {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

use anyhow::Error as BackendError;
use scrimbase_types::{EngineError, Key, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error as ThisError;

/// A record value plus its per-key version.
///
/// Versions are assigned by the store and increase by one on every applied
/// write to the key. Guard version `0` means "key absent".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned {
    pub value: Value,
    pub version: u64,
}

/// Errors surfaced by a backing store.
#[derive(Debug, ThisError)]
pub enum StoreError {
    /// A commit guard no longer held when the batch applied. Nothing was
    /// written; the caller's read-modify-write cycle should re-run.
    #[error("write conflict on {key}")]
    Contention { key: String },

    /// Propagated unchanged from the store's access-control layer.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transient failure (e.g. request timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Contention { key } => {
                EngineError::Conflict(format!("write conflict on {key}"))
            }
            StoreError::PermissionDenied(message) => EngineError::PermissionDenied(message),
            StoreError::Unavailable(message) => EngineError::Unavailable(message),
            StoreError::Backend(err) => EngineError::Unavailable(err.to_string()),
        }
    }
}

/// Staged write in a commit batch.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

/// Remote record store addressed by [`Key`].
///
/// `commit` is an atomic multi-location write: every guard
/// `(key, expected_version)` must still hold when the batch applies,
/// otherwise nothing applies and the commit fails with
/// [`StoreError::Contention`]. This compare-and-swap discipline replaces the
/// path-addressed last-write-wins writes used by the rest of the platform
/// for every balance- and aggregate-bearing record.
pub trait Store: Send + Sync {
    fn get(
        &self,
        key: &Key,
    ) -> impl Future<Output = Result<Option<Versioned>, StoreError>> + Send;

    fn commit(
        &self,
        guards: Vec<(Key, u64)>,
        writes: Vec<(Key, Status)>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process store backing the local gateway and unit tests.
#[derive(Default)]
pub struct Memory {
    records: Mutex<HashMap<Key, Versioned>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Versioned>> {
        match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => {
                tracing::warn!("memory store lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Store for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Versioned>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn commit(
        &self,
        guards: Vec<(Key, u64)>,
        writes: Vec<(Key, Status)>,
    ) -> Result<(), StoreError> {
        let mut records = self.lock();
        for (key, expected) in &guards {
            let current = records.get(key).map(|record| record.version).unwrap_or(0);
            if current != *expected {
                return Err(StoreError::Contention {
                    key: format!("{key:?}"),
                });
            }
        }
        for (key, status) in writes {
            match status {
                Status::Update(value) => {
                    let version = records.get(&key).map(|record| record.version).unwrap_or(0) + 1;
                    records.insert(key, Versioned { value, version });
                }
                Status::Delete => {
                    records.remove(&key);
                }
            }
        }
        Ok(())
    }
}

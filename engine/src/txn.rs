use scrimbase_types::{Key, Value};
use std::collections::BTreeMap;

use crate::store::{Status, Store, StoreError};

/// Read-snapshot / write-overlay for one optimistic commit cycle.
///
/// The first read of each key records its store version (including absence,
/// version 0) as a commit guard and caches the value so the cycle sees a
/// stable snapshot. Writes are staged and read back through the overlay.
/// `commit` submits every guard plus the staged writes as one atomic batch;
/// read-only keys are guarded too, so a decision taken on a record that
/// changed underneath fails with contention instead of applying.
pub struct Txn<'a, S: Store> {
    store: &'a S,
    reads: BTreeMap<Key, (u64, Option<Value>)>,
    pending: BTreeMap<Key, Status>,
}

impl<'a, S: Store> Txn<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            reads: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub async fn get(&mut self, key: &Key) -> Result<Option<Value>, StoreError> {
        match self.pending.get(key) {
            Some(Status::Update(value)) => return Ok(Some(value.clone())),
            Some(Status::Delete) => return Ok(None),
            None => {}
        }
        if let Some((_, value)) = self.reads.get(key) {
            return Ok(value.clone());
        }
        let (version, value) = match self.store.get(key).await? {
            Some(versioned) => (versioned.version, Some(versioned.value)),
            None => (0, None),
        };
        self.reads.insert(key.clone(), (version, value.clone()));
        Ok(value)
    }

    pub fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    pub fn delete(&mut self, key: Key) {
        self.pending.insert(key, Status::Delete);
    }

    pub fn has_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let guards = self
            .reads
            .into_iter()
            .map(|(key, (version, _))| (key, version))
            .collect();
        let writes = self.pending.into_iter().collect();
        self.store.commit(guards, writes).await
    }
}

//! In-memory [`KvBucket`] with real revision semantics, for tests.

use super::{KvBucket, KvEntry, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct MemoryKv {
    entries: Mutex<HashMap<String, (Vec<u8>, u64)>>,
    /// Number of upcoming writes to reject, for conflict/outage tests.
    pub(crate) fail_writes: Mutex<usize>,
    /// When set, every read fails as if the store were unreachable.
    pub(crate) fail_reads: Mutex<bool>,
}

impl MemoryKv {
    fn take_write_failure(&self) -> bool {
        let mut remaining = self.fail_writes.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn revision_of(&self, key: &str) -> Option<u64> {
        self.entries.lock().unwrap().get(key).map(|(_, rev)| *rev)
    }
}

#[async_trait]
impl KvBucket for MemoryKv {
    async fn entry(&self, key: &str) -> Result<Option<KvEntry>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Read("kv unreachable".to_string()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, revision)| KvEntry {
                value: value.clone(),
                revision: *revision,
            }))
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        if self.take_write_failure() {
            return Err(StoreError::Write("injected write failure".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Err(StoreError::Write(format!("key {key} already exists")));
        }
        entries.insert(key.to_string(), (value, 1));
        Ok(1)
    }

    async fn update(&self, key: &str, value: Vec<u8>, revision: u64) -> Result<u64, StoreError> {
        if self.take_write_failure() {
            return Err(StoreError::Write("injected write failure".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some((stored, current)) if *current == revision => {
                *stored = value;
                *current += 1;
                Ok(*current)
            }
            Some(_) => Err(StoreError::Write(format!(
                "wrong last sequence for key {key}"
            ))),
            None => Err(StoreError::Write(format!("key {key} not found"))),
        }
    }
}

//! In-memory stores for exercising the pipeline without a filesystem.

use super::{ItemRecordStore, LedgerStore, ledger_key_matches};
use crate::errors::StoreError;
use crate::story::{StoryId, StoryStatus, WorkItem};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    statuses: Mutex<BTreeMap<String, StoryStatus>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: &str, status: StoryStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), status);
    }
}

impl ItemRecordStore for MemoryRecordStore {
    fn status(&self, item: &WorkItem) -> Result<Option<StoryStatus>, StoreError> {
        Ok(self.statuses.lock().unwrap().get(item.id.as_str()).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<BTreeMap<String, StoryStatus>>,
    pub upserts: Mutex<u32>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, status: StoryStatus) {
        self.entries.lock().unwrap().insert(key.to_string(), status);
    }

    pub fn snapshot(&self) -> BTreeMap<String, StoryStatus> {
        self.entries.lock().unwrap().clone()
    }
}

impl LedgerStore for MemoryLedger {
    fn status(&self, id: &StoryId) -> Result<Option<StoryStatus>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| ledger_key_matches(k, id))
            .map(|(_, s)| s.clone()))
    }

    fn upsert(&self, id: &StoryId, status: &StoryStatus) -> Result<(), StoreError> {
        *self.upserts.lock().unwrap() += 1;
        let mut entries = self.entries.lock().unwrap();
        let key = entries
            .keys()
            .find(|k| ledger_key_matches(k, id))
            .cloned()
            .unwrap_or_else(|| id.to_string());
        entries.insert(key, status.clone());
        Ok(())
    }
}

//! In-process lease store.

use super::LeaseStore;
use crate::error::StoreError;
use crate::lease::{LeaseRecord, RecordId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

/// Lease store backed by a mutex-guarded map keyed by resource id.
///
/// The map key is the uniqueness constraint: an occupied entry rejects the
/// insert. Every operation completes under the one mutex, so deletes are
/// exact even under contention.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    records: Mutex<HashMap<i64, LeaseRecord>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Place a record directly, replacing whatever is there.
    ///
    /// Used to seed leases held by "another process", e.g. already expired.
    pub fn put(&self, record: LeaseRecord) {
        self.records().insert(record.resource_id, record);
    }

    fn records(&self) -> MutexGuard<'_, HashMap<i64, LeaseRecord>> {
        // A panic while holding the map cannot leave a half-applied record.
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn remove(&self, record_id: &RecordId, token: Option<&str>) -> Result<(), StoreError> {
        let resource_id = record_id.resource_id().ok_or(StoreError::NotFound)?;
        let mut records = self.records();

        match records.get(&resource_id) {
            Some(record) if &record.record_id == record_id => {
                if let Some(token) = token
                    && record.token != token
                {
                    return Err(StoreError::TokenMismatch);
                }
                records.remove(&resource_id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn insert(
        &self,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        match self.records().entry(resource_id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                let record_id = RecordId::generate(resource_id);
                slot.insert(LeaseRecord::new(
                    record_id.clone(),
                    resource_id,
                    token,
                    expires_at,
                ));
                Ok(record_id)
            }
        }
    }

    fn find(&self, resource_id: i64) -> Result<Option<LeaseRecord>, StoreError> {
        Ok(self.records().get(&resource_id).cloned())
    }

    fn delete(&self, record_id: &RecordId) -> Result<(), StoreError> {
        self.remove(record_id, None)
    }

    fn delete_with_token(&self, record_id: &RecordId, token: &str) -> Result<(), StoreError> {
        self.remove(record_id, Some(token))
    }

    fn list(&self) -> Result<Vec<LeaseRecord>, StoreError> {
        Ok(self.records().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn in_a_minute() -> DateTime<Utc> {
        Utc::now() + TimeDelta::minutes(1)
    }

    #[test]
    fn insert_enforces_one_record_per_resource() {
        let store = MemoryLeaseStore::new();

        let first = store.insert(5, "a", in_a_minute()).unwrap();
        assert_eq!(first.resource_id(), Some(5));
        assert_eq!(store.insert(5, "b", in_a_minute()), Err(StoreError::Conflict));

        // Other resources are independent
        store.insert(6, "b", in_a_minute()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_record_still_blocks_insert() {
        let store = MemoryLeaseStore::new();
        store
            .insert(1, "old", Utc::now() - TimeDelta::seconds(5))
            .unwrap();

        assert_eq!(store.insert(1, "new", in_a_minute()), Err(StoreError::Conflict));
    }

    #[test]
    fn find_returns_inserted_record() {
        let store = MemoryLeaseStore::new();
        assert!(store.find(9).unwrap().is_none());

        let record_id = store.insert(9, "tok", in_a_minute()).unwrap();
        let record = store.find(9).unwrap().unwrap();
        assert_eq!(record.record_id, record_id);
        assert_eq!(record.token, "tok");
        assert_eq!(record.pid, Some(std::process::id()));
    }

    #[test]
    fn delete_by_stale_record_id_leaves_new_record() {
        let store = MemoryLeaseStore::new();
        let old_id = store.insert(3, "a", in_a_minute()).unwrap();
        store.delete(&old_id).unwrap();
        let new_id = store.insert(3, "b", in_a_minute()).unwrap();

        assert_eq!(store.delete(&old_id), Err(StoreError::NotFound));
        assert_eq!(store.find(3).unwrap().unwrap().record_id, new_id);
    }

    #[test]
    fn delete_with_token_checks_holder() {
        let store = MemoryLeaseStore::new();
        let record_id = store.insert(4, "mine", in_a_minute()).unwrap();

        assert_eq!(
            store.delete_with_token(&record_id, "theirs"),
            Err(StoreError::TokenMismatch)
        );
        assert!(store.find(4).unwrap().is_some());

        store.delete_with_token(&record_id, "mine").unwrap();
        assert!(store.is_empty());
    }
}

use crate::error::StoreError;
use crate::lease::{LeaseRecord, LeaseSettings, RecordId, TokenPolicy};
use crate::store::{LeaseStore, MemoryLeaseStore};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Settings with a tiny retry delay so exhaustion tests run fast.
pub(crate) fn fast_settings(retries: u32) -> LeaseSettings {
    LeaseSettings {
        retries,
        retry_delay: Duration::from_millis(1),
        ttl: Duration::from_secs(30),
        token_policy: TokenPolicy::Unchecked,
    }
}

/// A record held by some other process, expiring `ttl` from now.
///
/// Pass a negative `ttl` for a lease that has already expired.
pub(crate) fn foreign_record(resource_id: i64, ttl: TimeDelta) -> LeaseRecord {
    let mut record = LeaseRecord::new(
        RecordId::generate(resource_id),
        resource_id,
        "foreign-token",
        Utc::now() + ttl,
    );
    record.owner = "someone@elsewhere".to_string();
    record.pid = Some(1);
    record
}

/// Memory store that records insert attempts and can be told to fail calls.
#[derive(Debug, Default)]
pub(crate) struct InstrumentedStore {
    pub(crate) inner: MemoryLeaseStore,
    inserts: Mutex<Vec<i64>>,
    failing_deletes: Mutex<HashSet<i64>>,
    unavailable_inserts: Mutex<u32>,
    broken: Mutex<bool>,
    broken_resources: Mutex<HashSet<i64>>,
}

impl InstrumentedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resource ids of every insert attempt, in call order.
    pub(crate) fn insert_attempts(&self) -> Vec<i64> {
        self.inserts.lock().unwrap().clone()
    }

    /// Resource ids of every insert attempt, with consecutive repeats collapsed.
    pub(crate) fn acquisition_order(&self) -> Vec<i64> {
        let mut order = self.insert_attempts();
        order.dedup();
        order
    }

    /// Make deletes of records for `resource_id` fail with a backend error.
    pub(crate) fn fail_deletes_for(&self, resource_id: i64) {
        self.failing_deletes.lock().unwrap().insert(resource_id);
    }

    /// Make the next `count` inserts fail with `Unavailable`.
    pub(crate) fn unavailable_for(&self, count: u32) {
        *self.unavailable_inserts.lock().unwrap() = count;
    }

    /// Make every insert fail with a non-transient backend error.
    pub(crate) fn break_backend(&self) {
        *self.broken.lock().unwrap() = true;
    }

    /// Make inserts for `resource_id` fail with a non-transient backend error.
    pub(crate) fn break_backend_for(&self, resource_id: i64) {
        self.broken_resources.lock().unwrap().insert(resource_id);
    }

    fn check_delete(&self, record_id: &RecordId) -> Result<(), StoreError> {
        let failing = self.failing_deletes.lock().unwrap();
        match record_id.resource_id() {
            Some(id) if failing.contains(&id) => {
                Err(StoreError::Backend("injected delete failure".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl LeaseStore for InstrumentedStore {
    fn insert(
        &self,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        self.inserts.lock().unwrap().push(resource_id);

        if *self.broken.lock().unwrap()
            || self.broken_resources.lock().unwrap().contains(&resource_id)
        {
            return Err(StoreError::Backend("injected backend failure".to_string()));
        }
        {
            let mut unavailable = self.unavailable_inserts.lock().unwrap();
            if *unavailable > 0 {
                *unavailable -= 1;
                return Err(StoreError::Unavailable("injected outage".to_string()));
            }
        }

        self.inner.insert(resource_id, token, expires_at)
    }

    fn find(&self, resource_id: i64) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.find(resource_id)
    }

    fn delete(&self, record_id: &RecordId) -> Result<(), StoreError> {
        self.check_delete(record_id)?;
        self.inner.delete(record_id)
    }

    fn delete_with_token(&self, record_id: &RecordId, token: &str) -> Result<(), StoreError> {
        self.check_delete(record_id)?;
        self.inner.delete_with_token(record_id, token)
    }

    fn list(&self) -> Result<Vec<LeaseRecord>, StoreError> {
        self.inner.list()
    }
}

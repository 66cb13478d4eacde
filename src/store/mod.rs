//! Lease store boundary.
//!
//! The lease manager keeps no coordination state of its own. Everything goes
//! through a [`LeaseStore`], which must enforce one invariant: at most one
//! record per resource id. That uniqueness check on insert is the only
//! source of mutual exclusion; the retry loop and reclamation on top of it
//! only help liveness.
//!
//! Two backends ship with the crate:
//! - [`MemoryLeaseStore`]: a mutex-guarded map, for a single process.
//! - [`FileLeaseStore`]: one file per resource, published with
//!   exclusive-create semantics and mutated under a per-resource lock file,
//!   shareable by processes on one host.

mod file;
mod memory;

pub use file::{FileLeaseStore, SCRATCH_MAX_AGE};
pub use memory::MemoryLeaseStore;

use crate::error::StoreError;
use crate::lease::{LeaseRecord, RecordId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistent table of lease records keyed by resource id.
pub trait LeaseStore: Send + Sync {
    /// Insert a record for `resource_id`.
    ///
    /// Fails with [`StoreError::Conflict`] if any record for the resource
    /// exists, expired or not.
    fn insert(
        &self,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError>;

    /// The current record for `resource_id`, if any.
    fn find(&self, resource_id: i64) -> Result<Option<LeaseRecord>, StoreError>;

    /// Delete a record by identity. [`StoreError::NotFound`] if it is gone.
    fn delete(&self, record_id: &RecordId) -> Result<(), StoreError>;

    /// Delete a record only if it is still held under `token`.
    fn delete_with_token(&self, record_id: &RecordId, token: &str) -> Result<(), StoreError>;

    /// Every record in the store.
    fn list(&self) -> Result<Vec<LeaseRecord>, StoreError>;
}

impl<S: LeaseStore + ?Sized> LeaseStore for Arc<S> {
    fn insert(
        &self,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        (**self).insert(resource_id, token, expires_at)
    }

    fn find(&self, resource_id: i64) -> Result<Option<LeaseRecord>, StoreError> {
        (**self).find(resource_id)
    }

    fn delete(&self, record_id: &RecordId) -> Result<(), StoreError> {
        (**self).delete(record_id)
    }

    fn delete_with_token(&self, record_id: &RecordId, token: &str) -> Result<(), StoreError> {
        (**self).delete_with_token(record_id, token)
    }

    fn list(&self) -> Result<Vec<LeaseRecord>, StoreError> {
        (**self).list()
    }
}

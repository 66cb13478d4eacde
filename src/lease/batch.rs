//! Batch acquisition over a canonical resource order.

use super::acquirer;
use super::guard::LeaseBatchGuard;
use super::releaser;
use super::types::{AcquiredLease, LeaseSettings};
use crate::error::{Result, StockLockError};
use crate::store::LeaseStore;

/// Parse, deduplicate, and sort requested resource ids.
///
/// Entries are trimmed and parsed as base-10 integers; anything that does not
/// parse is dropped. The ascending order returned here is the one global
/// order every batch acquires in.
pub fn normalize_resource_ids<I, T>(ids: I) -> Vec<i64>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut parsed: Vec<i64> = ids
        .into_iter()
        .filter_map(|id| id.as_ref().trim().parse::<i64>().ok())
        .collect();
    parsed.sort_unstable();
    parsed.dedup();
    parsed
}

/// Entry point for callers that need leases on inventory resources.
///
/// The manager owns its store handle and the retry/TTL settings. It keeps
/// no lease state itself, so one manager may be shared across threads.
#[derive(Debug, Clone)]
pub struct LeaseManager<S> {
    store: S,
    settings: LeaseSettings,
}

impl<S: LeaseStore> LeaseManager<S> {
    /// Create a manager with the default settings (30 × 75ms, 30s TTL).
    pub fn new(store: S) -> Self {
        Self::with_settings(store, LeaseSettings::default())
    }

    pub fn with_settings(store: S, settings: LeaseSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LeaseSettings {
        &self.settings
    }

    /// Acquire the lease for a single resource.
    pub fn acquire_lease(&self, resource_id: i64) -> Result<AcquiredLease> {
        acquirer::acquire_lease(&self.store, resource_id, &self.settings)
    }

    /// Reclaim the lease on `resource_id` if it has expired.
    pub fn reclaim_if_expired(&self, resource_id: i64) -> bool {
        acquirer::reclaim_if_expired(&self.store, resource_id, self.settings.token_policy)
    }

    /// Acquire leases on every resource named in `ids`, all or nothing.
    ///
    /// Ids are normalized with [`normalize_resource_ids`] and acquired one by
    /// one in ascending order. If any acquisition fails, the leases already
    /// taken in this call are released before the error is returned.
    pub fn acquire_batch<I, T>(&self, ids: I) -> Result<Vec<AcquiredLease>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.acquire_sorted(&normalize_resource_ids(ids))
    }

    /// Like [`acquire_batch`](Self::acquire_batch), for numeric ids.
    pub fn acquire_resources(&self, ids: &[i64]) -> Result<Vec<AcquiredLease>> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        self.acquire_sorted(&ordered)
    }

    fn acquire_sorted(&self, ordered: &[i64]) -> Result<Vec<AcquiredLease>> {
        let mut acquired = Vec::with_capacity(ordered.len());

        for &resource_id in ordered {
            match self.acquire_lease(resource_id) {
                Ok(lease) => acquired.push(lease),
                Err(e) => {
                    if !acquired.is_empty() {
                        tracing::info!(
                            failed_resource = resource_id,
                            rolled_back = acquired.len(),
                            "batch acquisition failed; releasing partial batch"
                        );
                    }
                    self.release_batch(&acquired);
                    return Err(e);
                }
            }
        }

        Ok(acquired)
    }

    /// Acquire a batch and wrap it in a guard that releases on drop.
    pub fn acquire_batch_guarded<I, T>(&self, ids: I) -> Result<LeaseBatchGuard<'_, S>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let leases = self.acquire_batch(ids)?;
        Ok(LeaseBatchGuard::new(
            &self.store,
            self.settings.token_policy,
            leases,
        ))
    }

    /// Release every lease in `leases`. Never fails.
    pub fn release_batch(&self, leases: &[AcquiredLease]) {
        releaser::release_batch(&self.store, leases, self.settings.token_policy);
    }

    /// Run `critical` while holding leases on every resource in `ids`.
    ///
    /// The leases are released on every exit path: success, an error from
    /// `critical`, or a panic unwinding through it.
    pub fn with_leases<I, T, F, R, E>(&self, ids: I, critical: F) -> std::result::Result<R, E>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
        F: FnOnce(&[AcquiredLease]) -> std::result::Result<R, E>,
        E: From<StockLockError>,
    {
        let guard = self.acquire_batch_guarded(ids)?;
        critical(guard.leases())
    }
}

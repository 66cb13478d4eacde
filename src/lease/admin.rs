//! Lease listing, clearing, and sweeping for operators.

use super::types::LeaseInfo;
use crate::error::{Result, StockLockError};
use crate::store::LeaseStore;
use chrono::Utc;

/// List all leases in the store with their freshness.
///
/// # Returns
///
/// Every record, sorted by resource id.
pub fn list_leases<S: LeaseStore + ?Sized>(store: &S) -> Result<Vec<LeaseInfo>> {
    let now = Utc::now();
    let mut leases: Vec<LeaseInfo> = store
        .list()?
        .into_iter()
        .map(|record| LeaseInfo {
            state: record.state_at(now),
            record,
        })
        .collect();

    // Sort by resource for consistent output
    leases.sort_by_key(|l| l.record.resource_id);

    Ok(leases)
}

/// Force-delete the lease on a resource, fresh or not.
///
/// The caller is responsible for deciding that clearing is appropriate
/// (the CLI requires `--force`).
///
/// # Returns
///
/// * `Ok(LeaseInfo)` - The cleared lease, for audit purposes
/// * `Err(StockLockError::UserError)` - No lease exists for the resource
pub fn clear_lease<S: LeaseStore + ?Sized>(store: &S, resource_id: i64) -> Result<LeaseInfo> {
    let record = store.find(resource_id)?.ok_or_else(|| {
        StockLockError::UserError(format!("no lease exists for resource {}", resource_id))
    })?;

    let info = LeaseInfo {
        state: record.state_at(Utc::now()),
        record,
    };

    store.delete(&info.record.record_id)?;
    tracing::info!(resource_id, owner = %info.record.owner, "lease cleared");

    Ok(info)
}

/// Reclaim every expired lease in the store. Fresh leases are untouched.
///
/// A lease that is released or reclaimed by someone else while the sweep runs
/// is simply skipped.
///
/// # Returns
///
/// The leases this sweep removed.
pub fn sweep_expired<S: LeaseStore + ?Sized>(store: &S) -> Result<Vec<LeaseInfo>> {
    let mut reclaimed = Vec::new();

    for info in list_leases(store)?.into_iter().filter(|l| l.record.is_expired_at(Utc::now())) {
        match store.delete_with_token(&info.record.record_id, &info.record.token) {
            Ok(()) => reclaimed.push(info),
            Err(e) => tracing::debug!(
                resource_id = info.record.resource_id,
                error = %e,
                "skipping lease during sweep"
            ),
        }
    }

    Ok(reclaimed)
}

//! Single-resource lease acquisition and expired-lease reclamation.

use super::record::{expiry_from_now, new_token};
use super::types::{AcquiredLease, LeaseSettings, TokenPolicy};
use crate::error::{Result, StockLockError};
use crate::store::LeaseStore;
use chrono::Utc;
use std::thread;

/// Acquire the lease for one resource.
///
/// Each attempt inserts a record under a fresh token; the store's uniqueness
/// constraint decides the winner. After a failed attempt any expired record
/// is reclaimed and the thread sleeps for `retry_delay` before trying again.
///
/// # Returns
///
/// * `Ok(AcquiredLease)` - The insert succeeded
/// * `Err(StockLockError::LeaseTimeout)` - Every attempt hit a held lease
/// * `Err(StockLockError::Store)` - The store failed in a non-transient way
pub fn acquire_lease<S: LeaseStore + ?Sized>(
    store: &S,
    resource_id: i64,
    settings: &LeaseSettings,
) -> Result<AcquiredLease> {
    let token = new_token();
    let attempts = settings.retries.max(1);

    for attempt in 1..=attempts {
        let expires_at = expiry_from_now(settings.ttl)?;

        match store.insert(resource_id, &token, expires_at) {
            Ok(record_id) => {
                tracing::debug!(resource_id, attempt, %record_id, "lease acquired");
                return Ok(AcquiredLease {
                    record_id,
                    resource_id,
                    token,
                });
            }
            Err(e) if e.is_transient() => {
                tracing::debug!(resource_id, attempt, error = %e, "lease attempt failed");
            }
            Err(e) => return Err(e.into()),
        }

        reclaim_if_expired(store, resource_id, settings.token_policy);

        if attempt < attempts {
            thread::sleep(settings.retry_delay);
        }
    }

    tracing::warn!(resource_id, attempts, "gave up waiting for lease");
    Err(StockLockError::LeaseTimeout {
        resource_id,
        attempts,
    })
}

/// Delete the record for `resource_id` if its TTL has run out.
///
/// Fresh records are never touched. Every failure is swallowed, since a
/// concurrent contender reclaiming the same record first is expected.
/// Returns whether this call removed a record.
pub fn reclaim_if_expired<S: LeaseStore + ?Sized>(
    store: &S,
    resource_id: i64,
    policy: TokenPolicy,
) -> bool {
    let record = match store.find(resource_id) {
        Ok(Some(record)) => record,
        Ok(None) => return false,
        Err(e) => {
            tracing::debug!(resource_id, error = %e, "could not read lease for reclamation");
            return false;
        }
    };

    if !record.is_expired_at(Utc::now()) {
        return false;
    }

    let deleted = match policy {
        TokenPolicy::Unchecked => store.delete(&record.record_id),
        TokenPolicy::Verified => store.delete_with_token(&record.record_id, &record.token),
    };

    match deleted {
        Ok(()) => {
            tracing::info!(
                resource_id,
                owner = %record.owner,
                expired_at = %record.expires_at,
                "reclaimed expired lease"
            );
            true
        }
        Err(e) => {
            tracing::debug!(resource_id, error = %e, "reclamation lost the race");
            false
        }
    }
}

//! Caller-side lease handles, settings, and listing structures.

use super::record::{LeaseRecord, LeaseState, RecordId};
use std::time::Duration;

/// Capability proving that the caller currently holds a lease.
///
/// Returned by a successful acquisition and handed back on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredLease {
    pub record_id: RecordId,
    pub resource_id: i64,
    pub token: String,
}

/// How deletes identify the record they are allowed to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Delete by record identity alone.
    #[default]
    Unchecked,
    /// Delete only if the stored token matches the caller's token.
    Verified,
}

/// Retry budget and lease lifetime used by the acquirer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseSettings {
    /// Insert attempts per resource before giving up.
    pub retries: u32,

    /// Pause between failed attempts.
    pub retry_delay: Duration,

    /// Lifetime of a lease before it becomes reclaimable.
    pub ttl: Duration,

    pub token_policy: TokenPolicy,
}

pub const DEFAULT_RETRIES: u32 = 30;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(75);
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            ttl: DEFAULT_TTL,
            token_policy: TokenPolicy::default(),
        }
    }
}

impl LeaseSettings {
    /// Upper bound on the time spent sleeping while waiting for one resource.
    ///
    /// Attempts are separated by `retry_delay`; there is no pause after the
    /// last one.
    pub fn max_wait(&self) -> Duration {
        self.retry_delay * self.retries.max(1).saturating_sub(1)
    }
}

/// A lease as seen by administrative listing.
#[derive(Debug, Clone)]
pub struct LeaseInfo {
    pub record: LeaseRecord,
    pub state: LeaseState,
}

impl std::fmt::Display for LeaseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "resource {} (owner: {}, {}{})",
            self.record.resource_id,
            self.record.owner,
            self.record.expiry_string(),
            if self.state == LeaseState::Stale {
                ", STALE"
            } else {
                ""
            }
        )
    }
}

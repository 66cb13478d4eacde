//! Persisted lease records and their identities.

use crate::error::{Result, StockLockError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Store-assigned identity of one lease record.
///
/// Formatted as `<resource_id>.<nonce>`, so a backend can locate the
/// resource slot from the id alone. A record re-created for the same
/// resource always gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh record id for a resource.
    pub fn generate(resource_id: i64) -> Self {
        Self(format!("{}.{}", resource_id, Uuid::new_v4().simple()))
    }

    /// The resource this record id was issued for.
    pub fn resource_id(&self) -> Option<i64> {
        self.0.split_once('.')?.0.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Freshness of a held lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// `now < expires_at`; never displaced.
    Fresh,
    /// The TTL has run out; any contender may reclaim it.
    Stale,
}

impl LeaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseState::Fresh => "fresh",
            LeaseState::Stale => "stale",
        }
    }
}

/// A lease record as persisted by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Identity of this particular record.
    pub record_id: RecordId,

    /// The product whose inventory window this lease protects.
    pub resource_id: i64,

    /// Opaque token of the holder.
    pub token: String,

    /// Instant after which the lease may be reclaimed.
    pub expires_at: DateTime<Utc>,

    /// Owner of the lease (e.g., `user@HOST`). Diagnostic only.
    pub owner: String,

    /// Process ID of the holder (optional). Diagnostic only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Timestamp when the record was inserted.
    pub created_at: DateTime<Utc>,
}

impl LeaseRecord {
    /// Build a record for insertion by the current process.
    pub fn new(
        record_id: RecordId,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id,
            resource_id,
            token: token.to_string(),
            expires_at,
            owner: get_owner_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
        }
    }

    /// Freshness of the lease at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> LeaseState {
        if now < self.expires_at {
            LeaseState::Fresh
        } else {
            LeaseState::Stale
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == LeaseState::Stale
    }

    /// Format the time until expiry, or since expiry, as a short string.
    pub fn expiry_string(&self) -> String {
        let delta = self.expires_at.signed_duration_since(Utc::now());
        if delta > TimeDelta::zero() {
            format!("expires in {}", format_delta(delta))
        } else {
            format!("expired {} ago", format_delta(-delta))
        }
    }
}

fn format_delta(delta: TimeDelta) -> String {
    let seconds = delta.num_seconds();
    let minutes = delta.num_minutes();
    let hours = delta.num_hours();

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else if seconds > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", delta.num_milliseconds())
    }
}

/// Generate a fresh holder token.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

/// Absolute expiry for a lease taken now with the given TTL.
pub fn expiry_from_now(ttl: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| StockLockError::UserError(format!("lease ttl {:?} is out of range", ttl)))
}

/// Get the owner string for lease metadata.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

//! Configuration defaults for stocklock.

use crate::lease::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TTL};

pub(crate) fn default_lease_retries() -> u32 {
    DEFAULT_RETRIES
}

pub(crate) fn default_lease_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

pub(crate) fn default_lease_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the lease manager.
///
/// This struct represents the contents of `.stocklock/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Acquisition settings
    // =========================================================================
    /// Insert attempts per resource before a lease timeout.
    #[serde(default = "default_lease_retries")]
    pub lease_retries: u32,

    /// Milliseconds to wait between attempts.
    #[serde(default = "default_lease_retry_delay_ms")]
    pub lease_retry_delay_ms: u64,

    // =========================================================================
    // Lease lifetime
    // =========================================================================
    /// Milliseconds after which an unreleased lease may be reclaimed.
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    /// Only delete a lease when the caller's token matches the stored one.
    #[serde(default)]
    pub verify_token_on_delete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lease_retries: default_lease_retries(),
            lease_retry_delay_ms: default_lease_retry_delay_ms(),
            lease_ttl_ms: default_lease_ttl_ms(),
            verify_token_on_delete: false,
        }
    }
}

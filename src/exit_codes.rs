//! Exit code constants for the stocklock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, missing lease)
//! - 2: Lease store failure
//! - 4: Lease acquisition timed out

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or nothing to operate on.
pub const USER_ERROR: i32 = 1;

/// The lease store failed unrecoverably.
pub const STORE_FAILURE: i32 = 2;

/// A lease could not be acquired within the retry budget.
pub const LEASE_TIMEOUT: i32 = 4;

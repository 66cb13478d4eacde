//! CLI argument parsing for stocklock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stocklock: inventory lease manager for concurrent checkouts.
///
/// Operates on the file-backed lease store under `.stocklock/`:
/// - Each held lease is one file in `.stocklock/leases/`
/// - Expired leases are reclaimed by the next contender, or by `sweep`
/// - Operator actions are recorded in `.stocklock/events/`
#[derive(Parser, Debug)]
#[command(name = "stocklock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory containing `.stocklock/` (default: current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Available commands for stocklock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the lease store in the root directory.
    ///
    /// Creates `.stocklock/` with a default `config.yaml` and `leases/`.
    Init,

    /// Lease management commands.
    ///
    /// List or clear leases.
    Lease(LeaseCommand),

    /// Reclaim every expired lease.
    ///
    /// Leases still within their TTL are never touched.
    Sweep,

    /// Acquire leases on a set of resources, hold them, then release.
    ///
    /// Resources are acquired in ascending id order, all or nothing.
    Hold(HoldArgs),
}

/// Lease subcommands.
#[derive(Parser, Debug)]
pub struct LeaseCommand {
    #[command(subcommand)]
    pub action: LeaseAction,
}

/// Available lease actions.
#[derive(Subcommand, Debug)]
pub enum LeaseAction {
    /// List all leases.
    ///
    /// Shows owner, expiry, and whether each lease is stale.
    List,

    /// Clear the lease on a resource.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LeaseClearArgs),
}

/// Arguments for the `lease clear` command.
#[derive(Parser, Debug)]
pub struct LeaseClearArgs {
    /// Resource (product) id whose lease should be cleared.
    #[arg(allow_negative_numbers = true)]
    pub resource_id: i64,

    /// Force clearing the lease (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Resource (product) ids to lease.
    #[arg(required = true, value_delimiter = ',')]
    pub resource_ids: Vec<String>,

    /// How long to hold the leases, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub hold_ms: u64,
}

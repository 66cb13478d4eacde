//! Command implementations for stocklock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

use crate::cli::{Command, HoldArgs, LeaseAction, LeaseClearArgs, LeaseCommand};
use serde_json::json;
use std::path::Path;
use std::thread;
use std::time::Duration;
use stocklock::config::Config;
use stocklock::context::{require_initialized_store, resolve_context};
use stocklock::error::{Result, StockLockError};
use stocklock::events::{Event, EventAction, append_event};
use stocklock::lease::{self, LeaseManager, LeaseState};
use stocklock::store::SCRATCH_MAX_AGE;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, root: Option<&Path>) -> Result<()> {
    match command {
        Command::Init => cmd_init(root),
        Command::Lease(lease_cmd) => dispatch_lease(lease_cmd, root),
        Command::Sweep => cmd_sweep(root),
        Command::Hold(args) => cmd_hold(args, root),
    }
}

/// Dispatch lease subcommands.
fn dispatch_lease(lease_cmd: LeaseCommand, root: Option<&Path>) -> Result<()> {
    match lease_cmd.action {
        LeaseAction::List => cmd_lease_list(root),
        LeaseAction::Clear(args) => cmd_lease_clear(args, root),
    }
}

fn cmd_init(root: Option<&Path>) -> Result<()> {
    let ctx = resolve_context(root)?;

    std::fs::create_dir_all(&ctx.leases_dir).map_err(|e| {
        StockLockError::UserError(format!(
            "failed to create leases directory '{}': {}",
            ctx.leases_dir.display(),
            e
        ))
    })?;

    let config_path = ctx.config_path();
    let created_config = !config_path.exists();
    if created_config {
        Config::default().save(&config_path)?;
    } else {
        // Refuse to leave a broken config in place silently
        Config::load(&config_path)?;
    }

    let event = Event::new(EventAction::Init).with_details(json!({
        "created_config": created_config,
    }));
    append_event(&ctx, &event)?;

    println!("Initialized lease store at {}", ctx.state_dir.display());
    if !created_config {
        println!("Kept existing config: {}", config_path.display());
    }

    Ok(())
}

fn cmd_lease_list(root: Option<&Path>) -> Result<()> {
    let ctx = require_initialized_store(root)?;
    let leases = lease::list_leases(&ctx.store())?;

    if leases.is_empty() {
        println!("No active leases.");
        return Ok(());
    }

    println!("Active leases ({}):", leases.len());
    println!();

    for info in &leases {
        let record = &info.record;
        println!("  resource {}:", record.resource_id);
        println!("    Owner:      {}", record.owner);
        if let Some(pid) = record.pid {
            println!("    PID:        {}", pid);
        }
        println!(
            "    Created:    {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!(
            "    Expires:    {} ({})",
            record.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.expiry_string()
        );
        if info.state == LeaseState::Stale {
            println!("    Status:     STALE (reclaimable)");
        }
        println!("    Record:     {}", record.record_id);
        println!();
    }

    let stale_count = leases
        .iter()
        .filter(|l| l.state == LeaseState::Stale)
        .count();
    if stale_count > 0 {
        println!(
            "Note: {} lease(s) are stale. Run `stocklock sweep` to reclaim them.",
            stale_count
        );
    }

    Ok(())
}

fn cmd_lease_clear(args: LeaseClearArgs, root: Option<&Path>) -> Result<()> {
    if !args.force {
        return Err(StockLockError::UserError(format!(
            "refusing to clear lease without --force flag.\n\n\
             Clearing a lease lets another checkout mutate stock while the holder may still be active.\n\
             Only clear leases if you are certain the holder has crashed.\n\n\
             To clear the lease, run:\n  stocklock lease clear {} --force",
            args.resource_id
        )));
    }

    let ctx = require_initialized_store(root)?;
    let cleared = lease::clear_lease(&ctx.store(), args.resource_id)?;

    // The lease is already gone; a failed log write must not fail the command
    if let Err(e) = append_event(&ctx, &Event::lease_cleared(&cleared)) {
        tracing::warn!(error = %e, "failed to log lease_clear event");
    }

    let record = &cleared.record;
    println!("Cleared lease on resource {}", record.resource_id);
    println!();
    println!("Lease details:");
    println!("  Owner:      {}", record.owner);
    if let Some(pid) = record.pid {
        println!("  PID:        {}", pid);
    }
    println!(
        "  Expires:    {} ({})",
        record.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
        record.expiry_string()
    );
    if cleared.state == LeaseState::Stale {
        println!("  Status:     was STALE");
    }

    Ok(())
}

fn cmd_sweep(root: Option<&Path>) -> Result<()> {
    let ctx = require_initialized_store(root)?;
    let store = ctx.store();
    let swept = lease::sweep_expired(&store)?;
    let purged = store.purge_scratch(SCRATCH_MAX_AGE)?;

    if let Err(e) = append_event(&ctx, &Event::swept(&swept)) {
        tracing::warn!(error = %e, "failed to log sweep event");
    }

    if swept.is_empty() {
        println!("No expired leases.");
    } else {
        println!("Reclaimed {} expired lease(s):", swept.len());
        for info in &swept {
            println!("  {}", info);
        }
    }
    if purged > 0 {
        println!("Removed {} abandoned scratch file(s).", purged);
    }

    Ok(())
}

fn cmd_hold(args: HoldArgs, root: Option<&Path>) -> Result<()> {
    let ctx = require_initialized_store(root)?;
    let config = ctx.load_config()?;
    let manager = LeaseManager::with_settings(ctx.store(), config.lease_settings());

    let guard = manager.acquire_batch_guarded(&args.resource_ids)?;
    if guard.leases().is_empty() {
        return Err(StockLockError::UserError(
            "no valid resource ids given (expected integers)".to_string(),
        ));
    }

    let ids: Vec<String> = guard.resource_ids().iter().map(|id| id.to_string()).collect();
    println!("Holding leases on: {}", ids.join(", "));

    thread::sleep(Duration::from_millis(args.hold_ms));

    match guard.release() {
        Ok(()) => println!("Released."),
        Err(failures) => {
            for (resource_id, e) in failures {
                tracing::warn!(resource_id, error = %e, "failed to release lease");
            }
            println!("Released with errors; unreleased leases will expire.");
        }
    }

    Ok(())
}

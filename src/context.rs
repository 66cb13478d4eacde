//! Lease store context resolution for the stocklock CLI.
//!
//! Resolves where the file-backed lease store, its config, and its event log
//! live. Everything sits under a state directory (`.stocklock/`) in a root
//! directory, which is the current working directory unless given explicitly.

use crate::config::Config;
use crate::error::{Result, StockLockError};
use crate::store::FileLeaseStore;
use std::env;
use std::path::{Path, PathBuf};

/// State directory name within the root.
pub const DEFAULT_STATE_DIR: &str = ".stocklock";

/// Resolved paths for a lease store.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Absolute path of the root directory.
    pub root: PathBuf,

    /// Absolute path of the state directory (`{root}/.stocklock/`).
    pub state_dir: PathBuf,

    /// Absolute path of the leases directory (`{root}/.stocklock/leases/`).
    pub leases_dir: PathBuf,
}

impl StoreContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            StockLockError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve the context rooted at a specific directory.
    pub fn resolve_from<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StockLockError::UserError(format!(
                "root directory does not exist: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            StockLockError::UserError(format!(
                "failed to resolve root directory '{}': {}",
                root.display(),
                e
            ))
        })?;

        let state_dir = root.join(DEFAULT_STATE_DIR);
        let leases_dir = state_dir.join("leases");

        Ok(Self {
            root,
            state_dir,
            leases_dir,
        })
    }

    /// Check if the state directory exists.
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Ensure the store is initialized, returning an error if not.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(StockLockError::UserError(format!(
                "stocklock not initialized.\n\
                 Expected state directory at: {}\n\n\
                 Run `stocklock init` to initialize it.",
                self.state_dir.display()
            )));
        }

        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Get the path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Get the path to the events file.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }

    /// Load the config, falling back to defaults when no file exists.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Open the file-backed lease store.
    pub fn store(&self) -> FileLeaseStore {
        FileLeaseStore::new(&self.leases_dir)
    }
}

/// Resolve the context from `root` (or the cwd) and require initialization.
pub fn require_initialized_store(root: Option<&Path>) -> Result<StoreContext> {
    let ctx = resolve_context(root)?;
    ctx.ensure_initialized()?;
    Ok(ctx)
}

/// Resolve the context without requiring initialization.
///
/// Use this in the `init` command where the state directory may not exist yet.
pub fn resolve_context(root: Option<&Path>) -> Result<StoreContext> {
    match root {
        Some(root) => StoreContext::resolve_from(root),
        None => StoreContext::resolve(),
    }
}

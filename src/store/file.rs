//! File-backed lease store.
//!
//! Each live lease is one JSON file, `resource-<id>.lease`, in the leases
//! directory. The filesystem provides the uniqueness constraint:
//!
//! 1. The record is written and synced to a private staging file.
//! 2. The staging file is hard-linked to the lease path. `link` fails with
//!    `AlreadyExists` if the path is taken, so exactly one contender wins, and
//!    a lease file is never observed half-written.
//!
//! Inserts and deletes of a resource also hold its mutation lock,
//! `.resource-<id>.mutex`, taken by exclusive create. A delete reads and
//! compares the record under that lock and only then removes the file, so the
//! lease path is never vacated for a record the caller does not own.
//!
//! A crash can leave a mutation lock or staging file behind. Mutation locks
//! older than [`MUTATION_LOCK_STALE_AFTER`] are broken by the next mutator;
//! [`FileLeaseStore::purge_scratch`] removes both kinds once they are old.

use super::LeaseStore;
use crate::error::StoreError;
use crate::lease::{LeaseRecord, RecordId};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use uuid::Uuid;

const LEASE_EXTENSION: &str = "lease";

/// How long a mutator waits for another to finish with the same resource.
const MUTATION_LOCK_WAIT: Duration = Duration::from_millis(500);

/// Age after which a mutation lock is assumed to belong to a dead process.
const MUTATION_LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

/// Age after which `sweep` treats a staging file or mutation lock as abandoned.
pub const SCRATCH_MAX_AGE: Duration = Duration::from_secs(60);

/// Lease store keeping one file per resource in a directory.
#[derive(Debug, Clone)]
pub struct FileLeaseStore {
    dir: PathBuf,
}

impl FileLeaseStore {
    /// Open a store rooted at `dir`. The directory is created on first insert.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lease file for a resource.
    pub fn lease_path(&self, resource_id: i64) -> PathBuf {
        self.dir
            .join(format!("resource-{}.{}", resource_id, LEASE_EXTENSION))
    }

    fn mutex_path(&self, resource_id: i64) -> PathBuf {
        self.dir.join(format!(".resource-{}.mutex", resource_id))
    }

    fn staging_path(&self, resource_id: i64) -> PathBuf {
        self.dir.join(format!(
            ".resource-{}.{}.staging",
            resource_id,
            Uuid::new_v4().simple()
        ))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                io_error(
                    format!("failed to create leases directory '{}'", self.dir.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Take the mutation lock for `resource_id`, waiting briefly for another
    /// mutator to finish.
    ///
    /// Fails with [`StoreError::Unavailable`] if the lock stays busy, and with
    /// [`StoreError::NotFound`] if the leases directory does not exist.
    fn lock_resource(&self, resource_id: i64) -> Result<MutationLock, StoreError> {
        let path = self.mutex_path(resource_id);
        let deadline = Instant::now() + MUTATION_LOCK_WAIT;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(MutationLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
                Err(e) => {
                    return Err(io_error(
                        format!("failed to lock resource {}", resource_id),
                        e,
                    ));
                }
            }

            if is_older_than(&path, MUTATION_LOCK_STALE_AFTER) && fs::remove_file(&path).is_ok() {
                tracing::warn!(resource_id, "broke stale mutation lock");
                continue;
            }

            if Instant::now() >= deadline {
                return Err(StoreError::Unavailable(format!(
                    "resource {} is being modified by another process",
                    resource_id
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn remove(&self, record_id: &RecordId, token: Option<&str>) -> Result<(), StoreError> {
        let resource_id = record_id.resource_id().ok_or(StoreError::NotFound)?;
        let lease_path = self.lease_path(resource_id);
        let _lock = self.lock_resource(resource_id)?;

        let record = read_record(&lease_path)?;
        if &record.record_id != record_id {
            return Err(StoreError::NotFound);
        }
        if token.is_some_and(|token| record.token != token) {
            return Err(StoreError::TokenMismatch);
        }

        match fs::remove_file(&lease_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(io_error(
                format!("failed to remove lease '{}'", lease_path.display()),
                e,
            )),
        }
    }

    /// Remove staging files and mutation locks older than `older_than`.
    ///
    /// These are only left behind by a process that died mid-operation.
    /// Returns how many files were removed.
    pub fn purge_scratch(&self, older_than: Duration) -> Result<usize, StoreError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| {
            io_error(
                format!("failed to read leases directory '{}'", self.dir.display()),
                e,
            )
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_scratch = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(".resource-"));
            if is_scratch && is_older_than(&path, older_than) && fs::remove_file(&path).is_ok() {
                tracing::info!(path = %path.display(), "removed leftover scratch file");
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Held mutation lock; the lock file is removed on drop.
struct MutationLock {
    path: PathBuf,
}

impl Drop for MutationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove mutation lock");
        }
    }
}

impl LeaseStore for FileLeaseStore {
    fn insert(
        &self,
        resource_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        self.ensure_dir()?;

        let record_id = RecordId::generate(resource_id);
        let record = LeaseRecord::new(record_id.clone(), resource_id, token, expires_at);
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| StoreError::Backend(format!("failed to serialize lease record: {}", e)))?;

        let _lock = self.lock_resource(resource_id)?;
        if self.lease_path(resource_id).exists() {
            return Err(StoreError::Conflict);
        }

        let staging = self.staging_path(resource_id);
        write_synced(&staging, json.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&staging);
            io_error(
                format!("failed to write lease record '{}'", staging.display()),
                e,
            )
        })?;

        let published = fs::hard_link(&staging, self.lease_path(resource_id));
        let _ = fs::remove_file(&staging);

        match published {
            Ok(()) => Ok(record_id),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::Conflict),
            Err(e) => Err(io_error(
                format!("failed to publish lease for resource {}", resource_id),
                e,
            )),
        }
    }

    fn find(&self, resource_id: i64) -> Result<Option<LeaseRecord>, StoreError> {
        match read_record(&self.lease_path(resource_id)) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, record_id: &RecordId) -> Result<(), StoreError> {
        self.remove(record_id, None)
    }

    fn delete_with_token(&self, record_id: &RecordId, token: &str) -> Result<(), StoreError> {
        self.remove(record_id, Some(token))
    }

    fn list(&self) -> Result<Vec<LeaseRecord>, StoreError> {
        let mut records = Vec::new();

        if !self.dir.exists() {
            return Ok(records);
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| {
            io_error(
                format!("failed to read leases directory '{}'", self.dir.display()),
                e,
            )
        })?;

        for entry in entries {
            let entry =
                entry.map_err(|e| io_error("failed to read leases directory entry".to_string(), e))?;
            let path = entry.path();

            // Skip scratch files and anything that is not a lease
            let is_lease = path.extension().and_then(|e| e.to_str()) == Some(LEASE_EXTENSION);
            let is_hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !is_lease || is_hidden {
                continue;
            }

            match read_record(&path) {
                Ok(record) => records.push(record),
                // Released between read_dir and read
                Err(StoreError::NotFound) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable lease file");
                }
            }
        }

        Ok(records)
    }
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn is_older_than(path: &Path, age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed >= age)
}

fn read_record(path: &Path) -> Result<LeaseRecord, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
        Err(e) => {
            return Err(io_error(
                format!("failed to read lease file '{}'", path.display()),
                e,
            ));
        }
    };

    serde_json::from_str(&content).map_err(|e| {
        StoreError::Corrupt(format!(
            "failed to parse lease file '{}': {}",
            path.display(),
            e
        ))
    })
}

fn io_error(context: String, e: io::Error) -> StoreError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut => {
            StoreError::Unavailable(format!("{}: {}", context, e))
        }
        _ => StoreError::Backend(format!("{}: {}", context, e)),
    }
}

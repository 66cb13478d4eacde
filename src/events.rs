//! Operator event log for stocklock.
//!
//! Administrative actions that remove leases by hand (clear, sweep) or set up
//! a store are appended to `.stocklock/events/events.ndjson`, one JSON object
//! per line, so a later reader can tell why a lease vanished.
//!
//! Each event has:
//! - `ts`: RFC3339 timestamp
//! - `action`: `init`, `lease_clear`, or `sweep`
//! - `actor`: the owner string (e.g., `user@HOST`)
//! - `resource`: optional resource id for single-lease events
//! - `details`: freeform object with action-specific details

use crate::context::StoreContext;
use crate::error::{Result, StockLockError};
use crate::lease::{LeaseInfo, get_owner_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// State directory created
    Init,
    /// Lease force-cleared by an operator
    LeaseClear,
    /// Expired leases swept
    Sweep,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Init => "init",
            EventAction::LeaseClear => "lease_clear",
            EventAction::Sweep => "sweep",
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Resource id for single-lease events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<i64>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_owner_string(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the resource id for this event.
    pub fn with_resource(mut self, resource_id: i64) -> Self {
        self.resource = Some(resource_id);
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Event for a lease removed by `lease clear`.
    pub fn lease_cleared(info: &LeaseInfo) -> Self {
        Self::new(EventAction::LeaseClear)
            .with_resource(info.record.resource_id)
            .with_details(json!({
                "record_id": info.record.record_id,
                "state": info.state.as_str(),
                "owner": info.record.owner,
                "pid": info.record.pid,
                "expires_at": info.record.expires_at,
            }))
    }

    /// Event for a sweep that reclaimed `swept`.
    pub fn swept(swept: &[LeaseInfo]) -> Self {
        let resources: Vec<i64> = swept.iter().map(|l| l.record.resource_id).collect();
        Self::new(EventAction::Sweep).with_details(json!({
            "reclaimed": resources,
            "count": swept.len(),
        }))
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            StockLockError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Append an event to the events log.
///
/// The file and its directory are created if missing. Each append writes
/// exactly one line and syncs it to disk.
pub fn append_event(ctx: &StoreContext, event: &Event) -> Result<()> {
    let events_file = ctx.events_file();
    let json_line = event.to_ndjson_line()?;
    let log_error = |what: &str, e: std::io::Error| {
        StockLockError::UserError(format!(
            "event log: failed to {} '{}': {}",
            what,
            events_file.display(),
            e
        ))
    };

    fs::create_dir_all(ctx.events_dir()).map_err(|e| log_error("create directory for", e))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| log_error("open", e))?;
    writeln!(file, "{}", json_line).map_err(|e| log_error("append to", e))?;
    file.sync_all().map_err(|e| log_error("sync", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::clear_lease;
    use crate::store::MemoryLeaseStore;
    use crate::test_support::foreign_record;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    fn create_test_context() -> (TempDir, StoreContext) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StoreContext::resolve_from(temp_dir.path()).unwrap();
        fs::create_dir_all(&ctx.state_dir).unwrap();
        (temp_dir, ctx)
    }

    #[test]
    fn test_event_creation() {
        let event = Event::new(EventAction::Init);

        assert_eq!(event.action, EventAction::Init);
        assert!(!event.actor.is_empty());
        assert!(event.resource.is_none());
        let age = Utc::now().signed_duration_since(event.ts);
        assert!(age.num_minutes() < 1);
    }

    #[test]
    fn test_lease_cleared_event() {
        let store = MemoryLeaseStore::new();
        store.put(foreign_record(17, TimeDelta::minutes(1)));
        let info = clear_lease(&store, 17).unwrap();

        let event = Event::lease_cleared(&info);

        assert_eq!(event.resource, Some(17));
        assert_eq!(event.details["state"], "fresh");
        assert_eq!(event.details["owner"], "someone@elsewhere");
    }

    #[test]
    fn test_event_action_serialization() {
        let json_line = Event::new(EventAction::LeaseClear).to_ndjson_line().unwrap();
        assert!(json_line.contains(&format!("\"{}\"", EventAction::LeaseClear)));
        assert!(!json_line.contains('\n'));

        // No resource field when None
        let parsed: Value = serde_json::from_str(&json_line).unwrap();
        assert!(parsed.get("resource").is_none());
    }

    #[test]
    fn test_append_event_multiple_lines() {
        let (_temp_dir, ctx) = create_test_context();
        assert!(!ctx.events_file().exists());

        append_event(&ctx, &Event::new(EventAction::Init)).unwrap();
        append_event(&ctx, &Event::swept(&[])).unwrap();

        let content = fs::read_to_string(ctx.events_file()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Event = serde_json::from_str(lines[0]).unwrap();
        let second: Event = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first.action, EventAction::Init);
        assert_eq!(second.action, EventAction::Sweep);
        assert_eq!(second.details["count"], 0);
    }
}

//! Renames observed on the real store, independent of staged edits.
//!
//! Used to find where a file went after the ledger was cleared, e.g. after
//! a restart. Best effort: the log is bounded by age and by size.

use crate::config::Config;
use crate::error::Result;
use crate::models::RenameEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

/// Where the rename log lives between runs.
pub trait RenameLogStore: Send {
    fn load_rename_log(&self) -> Result<Vec<RenameEvent>>;
    fn save_rename_log(&self, events: &[RenameEvent]) -> Result<()>;
}

pub struct RenameTracker {
    events: Vec<RenameEvent>,
    retention: Duration,
    capacity: usize,
    store: Option<Box<dyn RenameLogStore>>,
}

impl RenameTracker {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            retention,
            capacity,
            store: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rename_retention(), config.rename_capacity)
    }

    /// Loads the persisted log once; every later event is saved back.
    pub fn load(store: Box<dyn RenameLogStore>, config: &Config) -> Result<Self> {
        let mut events = store.load_rename_log()?;
        events.sort_by_key(|e| e.timestamp);

        let mut tracker = Self::from_config(config);
        tracker.events = events;
        tracker.store = Some(store);
        tracker.prune(Utc::now());
        Ok(tracker)
    }

    pub fn events(&self) -> &[RenameEvent] {
        &self.events
    }

    pub fn log_rename(&mut self, old_path: &str, new_path: &str) {
        self.log_rename_at(old_path, new_path, Utc::now());
    }

    pub fn log_rename_at(&mut self, old_path: &str, new_path: &str, timestamp: DateTime<Utc>) {
        let event = RenameEvent {
            old_path: old_path.to_string(),
            new_path: new_path.to_string(),
            timestamp,
        };
        let at = self.events.partition_point(|e| e.timestamp <= timestamp);
        self.events.insert(at, event);
        self.prune(Utc::now().max(timestamp));

        info!(from = old_path, to = new_path, "rename logged");

        if let Some(store) = &self.store {
            if let Err(e) = store.save_rename_log(&self.events) {
                warn!(error = %e, "failed to persist rename log");
            }
        }
    }

    pub fn find_rename(&self, old_path: &str, max_age: Duration) -> Option<String> {
        self.find_rename_at(old_path, max_age, Utc::now())
    }

    /// Follows `old_path` through successive renames and returns where it
    /// ended up, or `None` if it never moved or moved back to its start.
    pub fn find_rename_at(
        &self,
        old_path: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let mut current = old_path.to_string();
        let mut visited = HashSet::from([current.clone()]);
        let mut since = now - max_age;

        while let Some(event) = self
            .events
            .iter()
            .rev()
            .find(|e| e.old_path == current && e.timestamp >= since)
        {
            current = event.new_path.clone();
            since = event.timestamp;
            if !visited.insert(current.clone()) {
                break;
            }
        }

        (current != old_path).then_some(current)
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        self.events.retain(|e| e.timestamp >= cutoff);
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
        }
    }
}

//! In-memory ledgers shared by the command handlers and the monitor.
//!
//! Both ledgers are keyed by the container name the runtime reports. Each one
//! guards its own map and never holds its lock across an await. [`Ledgers`]
//! always takes its own lock before either ledger's.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// How long a manual stop keeps suppressing alerts.
pub const MANUAL_STOP_RETENTION: TimeDelta = TimeDelta::hours(24);

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every critical section leaves the map consistent, so a poisoned lock
    // still holds valid data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Containers an operator stopped through the bot, with the stop time.
#[derive(Debug, Default)]
pub struct ManualStopLedger {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ManualStopLedger {
    /// Record a stop at `at`, returning the entry it replaced.
    pub fn record(&self, name: &str, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        guard(&self.entries).insert(name.to_string(), at)
    }

    /// Put back the entry that existed before a failed stop.
    pub fn restore(&self, name: &str, previous: Option<DateTime<Utc>>) {
        let mut entries = guard(&self.entries);
        match previous {
            Some(at) => entries.insert(name.to_string(), at),
            None => entries.remove(name),
        };
    }

    pub fn contains(&self, name: &str) -> bool {
        guard(&self.entries).contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        guard(&self.entries).remove(name).is_some()
    }

    /// Drop every entry older than `retention`, returning the purged names.
    pub fn purge_expired(&self, now: DateTime<Utc>, retention: TimeDelta) -> Vec<String> {
        let mut purged = Vec::new();
        guard(&self.entries).retain(|name, stopped_at| {
            let keep = now - *stopped_at <= retention;
            if !keep {
                purged.push(name.clone());
            }
            keep
        });
        purged.sort();
        purged
    }

    /// Snapshot of all entries, sorted by name.
    pub fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut entries: Vec<_> = guard(&self.entries)
            .iter()
            .map(|(name, at)| (name.clone(), *at))
            .collect();
        entries.sort();
        entries
    }
}

/// Containers with an outstanding "stopped unexpectedly" alert.
#[derive(Debug, Default)]
pub struct AlertLedger {
    alerted: Mutex<HashSet<String>>,
}

impl AlertLedger {
    /// Returns `true` if the container was not already marked.
    pub fn insert(&self, name: &str) -> bool {
        guard(&self.alerted).insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        guard(&self.alerted).contains(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        guard(&self.alerted).remove(name)
    }

    /// Drop entries for containers not in `present`, returning them.
    pub fn retain_present(&self, present: &HashSet<&str>) -> Vec<String> {
        let mut dropped = Vec::new();
        guard(&self.alerted).retain(|name| {
            let keep = present.contains(name.as_str());
            if !keep {
                dropped.push(name.clone());
            }
            keep
        });
        dropped.sort();
        dropped
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = guard(&self.alerted).iter().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Default)]
pub struct Ledgers {
    pub manual_stops: ManualStopLedger,
    pub alerts: AlertLedger,
    /// Names cleared by an operator since the monitor last started a listing.
    /// Held while clearing and while raising alerts so the two never
    /// interleave.
    cleared: Mutex<HashSet<String>>,
}

impl Ledgers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything known about `name`. Used after an operator start or
    /// restart.
    pub fn clear(&self, name: &str) {
        let mut cleared = guard(&self.cleared);
        cleared.insert(name.to_string());
        self.manual_stops.remove(name);
        self.alerts.remove(name);
    }

    /// Called by the monitor right before it lists containers. A listing can
    /// be older than any clear that happens after this point.
    pub fn begin_cycle(&self) {
        guard(&self.cleared).clear();
    }

    /// Record `name` as already down without notifying. Skipped when an
    /// operator cleared it since the listing started.
    pub fn seed(&self, name: &str) -> bool {
        let cleared = guard(&self.cleared);
        !cleared.contains(name) && self.alerts.insert(name)
    }

    /// Mark `name` as alerted unless an operator stopped it, cleared it since
    /// the listing started, or it is already marked. Returns `true` when the
    /// caller should notify.
    pub fn raise_alert(&self, name: &str) -> bool {
        let cleared = guard(&self.cleared);
        if cleared.contains(name) || self.manual_stops.contains(name) || self.alerts.contains(name)
        {
            return false;
        }
        self.alerts.insert(name)
    }
}

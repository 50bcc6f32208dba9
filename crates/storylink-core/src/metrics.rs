//! Process-wide counters for story sync runs.
//!
//! [`crate::sync::StorySync`] bumps these as it resolves targets and moves
//! stories. The CLI `plan` command calls [`Metrics::flush`] once the plan is
//! built, which logs a single `info!` line with every counter.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every sync in this process.
pub static METRICS: Metrics = Metrics::new();

/// Sync counters. All updates are `Relaxed`: readers only need totals.
pub struct Metrics {
    events_processed: AtomicU64,
    targets_resolved: AtomicU64,
    stories_updated: AtomicU64,
    update_failures: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Events handed to a sync, matched or not.
    pub events_processed: u64,
    /// Events whose rule table lookup produced a target.
    pub targets_resolved: u64,
    /// Story moves the tracker accepted.
    pub stories_updated: u64,
    /// Story moves the tracker rejected.
    pub update_failures: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            targets_resolved: AtomicU64::new(0),
            stories_updated: AtomicU64::new(0),
            update_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_events_processed(&self) {
        bump(&self.events_processed, "events_processed");
    }

    pub fn inc_targets_resolved(&self) {
        bump(&self.targets_resolved, "targets_resolved");
    }

    pub fn inc_stories_updated(&self) {
        bump(&self.stories_updated, "stories_updated");
    }

    pub fn inc_update_failures(&self) {
        bump(&self.update_failures, "update_failures");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_processed: self.events_processed(),
            targets_resolved: self.targets_resolved(),
            stories_updated: self.stories_updated(),
            update_failures: self.update_failures(),
        }
    }

    /// Log the current counters as one `info!` event and return them.
    pub fn flush(&self) -> MetricsSnapshot {
        let snapshot = self.snapshot();
        tracing::info!(
            metric = "flush",
            events_processed = snapshot.events_processed,
            targets_resolved = snapshot.targets_resolved,
            stories_updated = snapshot.stories_updated,
            update_failures = snapshot.update_failures,
        );
        snapshot
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn targets_resolved(&self) -> u64 {
        self.targets_resolved.load(Ordering::Relaxed)
    }

    pub fn stories_updated(&self) -> u64 {
        self.stories_updated.load(Ordering::Relaxed)
    }

    pub fn update_failures(&self) -> u64 {
        self.update_failures.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.events_processed,
            &self.targets_resolved,
            &self.stories_updated,
            &self.update_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn bump(counter: &AtomicU64, name: &'static str) {
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(metric = name, "counter incremented");
}

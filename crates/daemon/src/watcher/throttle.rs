// Trailing-edge throttle for the watcher pipeline.
//
// The first event for a path arms a deadline `interval` after it was
// observed; later events for the same path fold into the pending entry
// without moving the deadline. At the deadline the path is released once, so
// a burst of N writes inside one interval yields exactly one notification
// carrying whatever is on disk at that moment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{FsEventKind, RawFsEvent};

/// Default throttle interval.
const DEFAULT_THROTTLE_MS: u64 = 200;
/// Minimum allowed throttle interval.
const MIN_THROTTLE_MS: u64 = 50;
/// Maximum allowed throttle interval.
const MAX_THROTTLE_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { interval: Duration::from_millis(DEFAULT_THROTTLE_MS) }
    }
}

impl ThrottleConfig {
    /// Interval in milliseconds, clamped to [50, 2000].
    pub fn with_millis(ms: u64) -> Self {
        let clamped = ms.clamp(MIN_THROTTLE_MS, MAX_THROTTLE_MS);
        Self { interval: Duration::from_millis(clamped) }
    }
}

struct PendingChange {
    deadline: Instant,
    first_observed_at: Instant,
    last_observed_at: Instant,
    events: usize,
}

/// A path whose deadline has passed and is due for a content read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyChange {
    pub path: PathBuf,
    pub first_observed_at: Instant,
    pub last_observed_at: Instant,
    /// Number of events folded into this change.
    pub events: usize,
}

pub struct Throttle {
    config: ThrottleConfig,
    pending: HashMap<PathBuf, PendingChange>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config, pending: HashMap::new() }
    }

    /// Record an event. Removals are not content changes and are dropped;
    /// returns whether the event was accepted.
    pub fn push(&mut self, event: RawFsEvent) -> bool {
        if event.kind == FsEventKind::Remove {
            return false;
        }

        let interval = self.config.interval;
        let observed_at = event.observed_at;
        let pending = self.pending.entry(event.path).or_insert_with(|| PendingChange {
            deadline: observed_at + interval,
            first_observed_at: observed_at,
            last_observed_at: observed_at,
            events: 0,
        });
        pending.last_observed_at = pending.last_observed_at.max(observed_at);
        pending.events += 1;
        true
    }

    /// Release every path whose deadline is at or before `now`, earliest
    /// deadline first.
    pub fn drain_ready_at(&mut self, now: Instant) -> Vec<ReadyChange> {
        let mut ready = Vec::new();

        self.pending.retain(|path, pending| {
            if pending.deadline <= now {
                ready.push((
                    pending.deadline,
                    ReadyChange {
                        path: path.clone(),
                        first_observed_at: pending.first_observed_at,
                        last_observed_at: pending.last_observed_at,
                        events: pending.events,
                    },
                ));
                false
            } else {
                true
            }
        });

        ready.sort_by_key(|(deadline, _)| *deadline);
        ready.into_iter().map(|(_, change)| change).collect()
    }

    pub fn drain_ready(&mut self) -> Vec<ReadyChange> {
        self.drain_ready_at(Instant::now())
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest pending deadline, or None if nothing is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }
}

//! Toplevel activity tracking.
//!
//! Feeds on a foreign-toplevel-management event stream: per toplevel, an
//! `app_id` / `state` pair is staged into a pending snapshot and committed on
//! `done`. The tracker folds commits into per-app-id counters of running and
//! activated toplevels, which the bars use to light up their buttons.
//!
//! Counters saturate at zero on decrement; protocol ordering across toplevel
//! announcement and bar startup is not strict enough to rule out a `closed`
//! for state we never counted.

use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    app_id: Option<String>,
    activated: bool,
}

#[derive(Debug, Default)]
struct Toplevel {
    current: Snapshot,
    pending: Snapshot,
}

/// Tracks live toplevels under opaque keys (the protocol layer uses its
/// object ids) and keeps per-app-id activity counters.
#[derive(Debug)]
pub struct ActivityTracker<K: Hash + Eq + Clone> {
    toplevels: HashMap<K, Toplevel>,
    running: HashMap<String, u32>,
    activated: HashMap<String, u32>,
}

impl<K: Hash + Eq + Clone> Default for ActivityTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone> ActivityTracker<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            toplevels: HashMap::new(),
            running: HashMap::new(),
            activated: HashMap::new(),
        }
    }

    /// A new toplevel was announced. Counters stay untouched until `done`.
    pub fn announce(&mut self, key: K) {
        self.toplevels.entry(key).or_default();
    }

    /// Stage a pending app-id.
    pub fn set_app_id(&mut self, key: &K, app_id: String) {
        let toplevel = self.toplevels.entry(key.clone()).or_default();
        toplevel.pending.app_id = Some(app_id);
    }

    /// Stage the pending activated flag.
    pub fn set_activated(&mut self, key: &K, activated: bool) {
        let toplevel = self.toplevels.entry(key.clone()).or_default();
        toplevel.pending.activated = activated;
    }

    /// Commit pending → current (the protocol's `done`). Returns `true` if
    /// any counter changed and the bars need a redraw.
    pub fn commit(&mut self, key: &K) -> bool {
        let Some(toplevel) = self.toplevels.get_mut(key) else {
            return false;
        };
        let current = toplevel.current.clone();
        let pending = toplevel.pending.clone();
        toplevel.current = pending.clone();

        if current.app_id != pending.app_id {
            if let Some(old) = &current.app_id {
                decrement(&mut self.running, old);
                if current.activated {
                    decrement(&mut self.activated, old);
                }
            }
            if let Some(new) = &pending.app_id {
                increment(&mut self.running, new);
                if pending.activated {
                    increment(&mut self.activated, new);
                }
                debug!("toplevel committed as `{new}`");
            }
            current.app_id.is_some() || pending.app_id.is_some()
        } else if current.activated != pending.activated {
            if let Some(app_id) = &pending.app_id {
                if pending.activated {
                    increment(&mut self.activated, app_id);
                } else {
                    decrement(&mut self.activated, app_id);
                }
                return true;
            }
            false
        } else {
            false
        }
    }

    /// The toplevel closed: release its committed counters and drop it.
    /// Returns `true` if any counter changed.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(toplevel) = self.toplevels.remove(key) else {
            return false;
        };
        match toplevel.current.app_id {
            Some(app_id) => {
                decrement(&mut self.running, &app_id);
                if toplevel.current.activated {
                    decrement(&mut self.activated, &app_id);
                }
                true
            }
            None => false,
        }
    }

    /// Number of live toplevels whose committed app-id matches.
    #[must_use]
    pub fn running_count(&self, app_id: &str) -> u32 {
        self.running.get(app_id).copied().unwrap_or(0)
    }

    /// Number of those that are currently activated.
    #[must_use]
    pub fn activated_count(&self, app_id: &str) -> u32 {
        self.activated.get(app_id).copied().unwrap_or(0)
    }

    /// Any live toplevel with this committed app-id, for the toplevel
    /// meta-actions.
    #[must_use]
    pub fn find_running(&self, app_id: &str) -> Option<&K> {
        self.toplevels
            .iter()
            .find(|(_, t)| t.current.app_id.as_deref() == Some(app_id))
            .map(|(k, _)| k)
    }
}

fn increment(map: &mut HashMap<String, u32>, app_id: &str) {
    *map.entry(app_id.to_string()).or_insert(0) += 1;
}

fn decrement(map: &mut HashMap<String, u32>, app_id: &str) {
    if let Some(n) = map.get_mut(app_id) {
        *n = n.saturating_sub(1);
        if *n == 0 {
            map.remove(app_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_counts_running_and_activated() {
        let mut tracker = ActivityTracker::new();
        tracker.announce(1);
        tracker.set_app_id(&1, "firefox".into());
        tracker.set_activated(&1, true);
        // Nothing visible before done.
        assert_eq!(tracker.running_count("firefox"), 0);

        assert!(tracker.commit(&1));
        assert_eq!(tracker.running_count("firefox"), 1);
        assert_eq!(tracker.activated_count("firefox"), 1);
    }

    #[test]
    fn app_id_change_moves_counters() {
        let mut tracker = ActivityTracker::new();
        tracker.announce(7);
        tracker.set_app_id(&7, "firefox".into());
        tracker.set_activated(&7, true);
        tracker.commit(&7);

        tracker.set_app_id(&7, "nightly".into());
        assert!(tracker.commit(&7));
        assert_eq!(tracker.running_count("firefox"), 0);
        assert_eq!(tracker.activated_count("firefox"), 0);
        assert_eq!(tracker.running_count("nightly"), 1);
        assert_eq!(tracker.activated_count("nightly"), 1);
    }

    #[test]
    fn activation_only_change_touches_one_counter() {
        let mut tracker = ActivityTracker::new();
        tracker.announce(3);
        tracker.set_app_id(&3, "foot".into());
        tracker.commit(&3);

        tracker.set_activated(&3, true);
        assert!(tracker.commit(&3));
        assert_eq!(tracker.running_count("foot"), 1);
        assert_eq!(tracker.activated_count("foot"), 1);

        tracker.set_activated(&3, false);
        assert!(tracker.commit(&3));
        assert_eq!(tracker.activated_count("foot"), 0);
        // No change at all is not a redraw.
        assert!(!tracker.commit(&3));
    }

    #[test]
    fn close_releases_counters_and_never_goes_negative() {
        let mut tracker = ActivityTracker::new();
        tracker.announce(1);
        tracker.set_app_id(&1, "foot".into());
        tracker.commit(&1);

        assert!(tracker.remove(&1));
        assert_eq!(tracker.running_count("foot"), 0);
        // Closing again, or closing something never committed, is harmless.
        assert!(!tracker.remove(&1));
        tracker.announce(2);
        assert!(!tracker.remove(&2));
        assert_eq!(tracker.running_count("foot"), 0);
    }

    #[test]
    fn counters_match_live_set_after_event_storm() {
        let mut tracker = ActivityTracker::new();
        for key in 0..4 {
            tracker.announce(key);
            tracker.set_app_id(&key, "term".into());
            tracker.commit(&key);
        }
        tracker.set_activated(&2, true);
        tracker.commit(&2);
        tracker.remove(&0);
        tracker.remove(&3);

        assert_eq!(tracker.running_count("term"), 2);
        assert_eq!(tracker.activated_count("term"), 1);
        assert!(tracker.find_running("term").is_some());

        tracker.remove(&1);
        tracker.remove(&2);
        assert_eq!(tracker.running_count("term"), 0);
        assert_eq!(tracker.activated_count("term"), 0);
        assert!(tracker.find_running("term").is_none());
    }
}

//! Viewer presence tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

/// Tracks which client addresses recently fetched each stream.
///
/// A client counts as watching while its last fetch is younger than the TTL.
/// Expired clients are dropped by [`sweep`](Self::sweep); a stream's key is
/// kept once seen.
pub struct ViewerTracker {
    ttl: Duration,
    entries: RwLock<HashMap<String, HashMap<String, Instant>>>,
}

impl ViewerTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Record that `client` fetched media of `stream` just now.
    pub fn record_fetch(&self, stream: &str, client: &str) {
        self.record_fetch_at(stream, client, Instant::now());
    }

    /// Record a fetch at an explicit instant.
    pub fn record_fetch_at(&self, stream: &str, client: &str, now: Instant) {
        let mut entries = self.entries.write();
        entries
            .entry(stream.to_string())
            .or_default()
            .insert(client.to_string(), now);
    }

    /// Remove entries older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Sweep relative to an explicit instant.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        let mut entries = self.entries.write();
        // Stream keys stay; only their client sets shrink.
        for clients in entries.values_mut() {
            let before = clients.len();
            clients.retain(|_, last_seen| now.saturating_duration_since(*last_seen) <= self.ttl);
            removed += before - clients.len();
        }
        if removed > 0 {
            trace!(removed, "Swept idle viewers");
        }
        removed
    }

    /// Current number of distinct clients watching `stream`.
    pub fn count_for(&self, stream: &str) -> usize {
        self.entries.read().get(stream).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_after_ttl() {
        let tracker = ViewerTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.record_fetch_at("ryuu", "10.0.0.1", t0);

        tracker.sweep_at(t0 + Duration::from_secs(29));
        assert_eq!(tracker.count_for("ryuu"), 1);

        tracker.sweep_at(t0 + Duration::from_secs(31));
        assert_eq!(tracker.count_for("ryuu"), 0);
    }

    #[test]
    fn test_sweep_keeps_stream_keys() {
        let tracker = ViewerTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.record_fetch_at("ryuu", "10.0.0.1", t0);

        assert_eq!(tracker.sweep_at(t0 + Duration::from_secs(60)), 1);
        assert!(tracker.entries.read().contains_key("ryuu"));

        tracker.record_fetch_at("ryuu", "10.0.0.2", t0 + Duration::from_secs(61));
        assert_eq!(tracker.count_for("ryuu"), 1);
    }

    #[test]
    fn test_refetch_extends_presence() {
        let tracker = ViewerTracker::new(Duration::from_secs(30));
        let t0 = Instant::now();
        tracker.record_fetch_at("ryuu", "10.0.0.1", t0);
        tracker.record_fetch_at("ryuu", "10.0.0.1", t0 + Duration::from_secs(20));

        assert_eq!(tracker.sweep_at(t0 + Duration::from_secs(40)), 0);
        assert_eq!(tracker.count_for("ryuu"), 1);
    }

    #[test]
    fn test_counts_distinct_clients_per_stream() {
        let tracker = ViewerTracker::new(Duration::from_secs(30));
        tracker.record_fetch("ryuu", "10.0.0.1");
        tracker.record_fetch("ryuu", "10.0.0.1");
        tracker.record_fetch("ryuu", "10.0.0.2");
        tracker.record_fetch("cam", "10.0.0.1");

        assert_eq!(tracker.count_for("ryuu"), 2);
        assert_eq!(tracker.count_for("cam"), 1);
        assert_eq!(tracker.count_for("other"), 0);
    }
}

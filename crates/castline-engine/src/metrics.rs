//! Orchestrator counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Point-in-time view of the orchestrator counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub active_sessions: usize,
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub startup_failures: u64,
    pub ignored_stops: u64,
    pub thumbnails_written: u64,
    pub thumbnails_skipped: u64,
    pub thumbnails_failed: u64,
    pub fetches_recorded: u64,
    pub uptime_seconds: u64,
}

/// Lock-free counters shared by the orchestrator and its tasks.
pub struct MetricsCollector {
    start_time: Instant,
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    startup_failures: AtomicU64,
    ignored_stops: AtomicU64,
    thumbnails_written: AtomicU64,
    thumbnails_skipped: AtomicU64,
    thumbnails_failed: AtomicU64,
    fetches_recorded: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            sessions_started: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            startup_failures: AtomicU64::new(0),
            ignored_stops: AtomicU64::new(0),
            thumbnails_written: AtomicU64::new(0),
            thumbnails_skipped: AtomicU64::new(0),
            thumbnails_failed: AtomicU64::new(0),
            fetches_recorded: AtomicU64::new(0),
        }
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_startup_failure(&self) {
        self.startup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stop for an unknown or already-stopping session.
    pub fn record_ignored_stop(&self) {
        self.ignored_stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thumbnail_written(&self) {
        self.thumbnails_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a thumbnail tick that found no segment.
    pub fn record_thumbnail_skipped(&self) {
        self.thumbnails_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thumbnail_failed(&self) {
        self.thumbnails_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counters.
    pub fn snapshot(&self, active_sessions: usize) -> OrchestratorStats {
        OrchestratorStats {
            active_sessions,
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            startup_failures: self.startup_failures.load(Ordering::Relaxed),
            ignored_stops: self.ignored_stops.load(Ordering::Relaxed),
            thumbnails_written: self.thumbnails_written.load(Ordering::Relaxed),
            thumbnails_skipped: self.thumbnails_skipped.load(Ordering::Relaxed),
            thumbnails_failed: self.thumbnails_failed.load(Ordering::Relaxed),
            fetches_recorded: self.fetches_recorded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_session_started();
        metrics.record_session_started();
        metrics.record_session_stopped();
        metrics.record_ignored_stop();
        metrics.record_fetch();

        let stats = metrics.snapshot(1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.sessions_started, 2);
        assert_eq!(stats.sessions_stopped, 1);
        assert_eq!(stats.ignored_stops, 1);
        assert_eq!(stats.fetches_recorded, 1);
        assert_eq!(stats.startup_failures, 0);
    }
}

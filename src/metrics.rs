// Run metrics for the workflow pinning utility
//
// Counters are atomic so the runner can share one instance by reference.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected over one pinning run.
#[derive(Debug)]
pub struct Metrics {
    /// Workflows the pinning tool processed successfully
    pub workflows_pinned: AtomicUsize,

    /// Workflows where the tool failed, timed out, or could not start
    pub workflows_failed: AtomicUsize,

    /// Workflows left alone because every reference was already pinned
    pub workflows_skipped: AtomicUsize,

    /// Total time spent inside the pinning tool in milliseconds
    pub total_tool_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            workflows_pinned: AtomicUsize::new(0),
            workflows_failed: AtomicUsize::new(0),
            workflows_skipped: AtomicUsize::new(0),
            total_tool_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_pinned(&self) {
        self.workflows_pinned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.workflows_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.workflows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent in one tool invocation
    pub fn record_tool_time(&self, duration: Duration) {
        self.total_tool_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn pinned(&self) -> usize {
        self.workflows_pinned.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.workflows_failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.workflows_skipped.load(Ordering::Relaxed)
    }

    /// Workflows handed to the tool, successful or not
    pub fn attempted(&self) -> usize {
        self.pinned() + self.failed()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average tool time per attempted workflow in milliseconds
    pub fn avg_tool_time_ms(&self) -> f64 {
        let total = self.total_tool_time_ms.load(Ordering::Relaxed);
        let count = self.attempted();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        tracing::info!(
            success = self.pinned(),
            failed = self.failed(),
            skipped = self.skipped(),
            total = self.attempted(),
            elapsed_secs = self.elapsed().as_secs_f64(),
            avg_tool_time_ms = self.avg_tool_time_ms(),
            "Pinning complete"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.pinned(), 0);
        assert_eq!(metrics.failed(), 0);
        assert_eq!(metrics.skipped(), 0);
    }

    #[test]
    fn test_record_workflow_outcomes() {
        let metrics = Metrics::new();

        metrics.record_pinned();
        metrics.record_pinned();
        metrics.record_failed();
        metrics.record_skipped();

        assert_eq!(metrics.pinned(), 2);
        assert_eq!(metrics.failed(), 1);
        assert_eq!(metrics.skipped(), 1);
        assert_eq!(metrics.attempted(), 3);
    }

    #[test]
    fn test_record_tool_time() {
        let metrics = Metrics::new();

        metrics.record_pinned();
        metrics.record_tool_time(Duration::from_millis(100));
        metrics.record_failed();
        metrics.record_tool_time(Duration::from_millis(200));

        assert_eq!(metrics.total_tool_time_ms.load(Ordering::Relaxed), 300);
        assert_eq!(metrics.avg_tool_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_tool_time_without_runs() {
        assert_eq!(Metrics::new().avg_tool_time_ms(), 0.0);
    }

    #[test]
    fn test_elapsed() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.elapsed().as_millis() >= 10);
    }
}

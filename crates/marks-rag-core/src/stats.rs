//! Process-wide query statistics.
//!
//! [`StatsTracker`] keeps the counters behind one mutex so concurrent
//! completions never lose an update. The average response time covers
//! successful queries only and is maintained incrementally.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QueryStatistics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    /// Mean seconds per successful query.
    pub avg_response_time: f64,
}

impl QueryStatistics {
    /// Percentage of queries that succeeded, or `None` before the first one.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_queries == 0 {
            None
        } else {
            Some(self.successful_queries as f64 * 100.0 / self.total_queries as f64)
        }
    }
}

#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: Mutex<QueryStatistics>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, response_secs: f64) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        s.total_queries += 1;
        s.successful_queries += 1;
        let n = s.successful_queries as f64;
        s.avg_response_time += (response_secs - s.avg_response_time) / n;
    }

    pub fn record_failure(&self) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        s.total_queries += 1;
        s.failed_queries += 1;
    }

    pub fn snapshot(&self) -> QueryStatistics {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_average_is_arithmetic_mean() {
        let tracker = StatsTracker::new();
        let times = [0.5, 1.25, 2.0, 0.75, 3.1, 0.2, 1.0, 4.4, 0.9, 1.6];
        for t in times {
            tracker.record_success(t);
        }
        let s = tracker.snapshot();
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        assert_eq!(s.successful_queries, 10);
        assert!((s.avg_response_time - mean).abs() < 1e-9);
    }

    #[test]
    fn test_failures_do_not_move_average() {
        let tracker = StatsTracker::new();
        tracker.record_success(2.0);
        tracker.record_failure();
        tracker.record_failure();
        let s = tracker.snapshot();
        assert_eq!(s.total_queries, 3);
        assert_eq!(s.failed_queries, 2);
        assert!((s.avg_response_time - 2.0).abs() < 1e-12);
        assert!((s.success_rate().unwrap() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(QueryStatistics::default().success_rate(), None);
    }

    #[test]
    fn test_concurrent_updates_not_lost() {
        let tracker = Arc::new(StatsTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        t.record_success(1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = tracker.snapshot();
        assert_eq!(s.successful_queries, 2000);
        assert!((s.avg_response_time - 1.0).abs() < 1e-9);
    }
}

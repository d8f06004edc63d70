use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the segmentation engine.
///
/// Tracks page throughput, per-strategy outcomes, and stage durations.
/// Thread-safe and cheap to clone; callers export via `snapshot()`.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Throughput
    pages_processed: AtomicUsize,
    pages_empty: AtomicUsize,
    panels_total: AtomicUsize,

    // Strategy outcomes
    strategy_wins: DashMap<String, AtomicUsize>,
    strategy_errors: AtomicUsize,

    // Stage durations
    crop_duration_ms: RwLock<Vec<u64>>,
    detect_duration_ms: RwLock<Vec<u64>>,
    materialize_duration_ms: RwLock<Vec<u64>>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                pages_processed: AtomicUsize::new(0),
                pages_empty: AtomicUsize::new(0),
                panels_total: AtomicUsize::new(0),
                strategy_wins: DashMap::new(),
                strategy_errors: AtomicUsize::new(0),
                crop_duration_ms: RwLock::new(Vec::new()),
                detect_duration_ms: RwLock::new(Vec::new()),
                materialize_duration_ms: RwLock::new(Vec::new()),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_page(&self, panel_count: usize) {
        self.inner.pages_processed.fetch_add(1, Ordering::Relaxed);
        if panel_count == 0 {
            self.inner.pages_empty.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .panels_total
            .fetch_add(panel_count, Ordering::Relaxed);
    }

    pub fn record_strategy_win(&self, strategy: &str) {
        self.inner
            .strategy_wins
            .entry(strategy.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_strategy_error(&self) {
        self.inner.strategy_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crop_duration(&self, duration: Duration) {
        self.inner
            .crop_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_detect_duration(&self, duration: Duration) {
        self.inner
            .detect_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_materialize_duration(&self, duration: Duration) {
        self.inner
            .materialize_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let crop_durations = self.inner.crop_duration_ms.read();
        let crop_avg = avg(&crop_durations);
        drop(crop_durations);

        let detect_durations = self.inner.detect_duration_ms.read();
        let detect_avg = avg(&detect_durations);
        let detect_p95 = percentile(&detect_durations, 0.95);
        drop(detect_durations);

        let materialize_durations = self.inner.materialize_duration_ms.read();
        let materialize_avg = avg(&materialize_durations);
        drop(materialize_durations);

        let strategy_wins: HashMap<String, usize> = self
            .inner
            .strategy_wins
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            pages_processed: self.inner.pages_processed.load(Ordering::Relaxed),
            pages_empty: self.inner.pages_empty.load(Ordering::Relaxed),
            panels_total: self.inner.panels_total.load(Ordering::Relaxed),
            strategy_wins,
            strategy_errors: self.inner.strategy_errors.load(Ordering::Relaxed),
            crop_avg_ms: crop_avg,
            detect_avg_ms: detect_avg,
            detect_p95_ms: detect_p95,
            materialize_avg_ms: materialize_avg,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pages_processed: usize,
    pub pages_empty: usize,
    pub panels_total: usize,
    pub strategy_wins: HashMap<String, usize>,
    pub strategy_errors: usize,
    pub crop_avg_ms: u64,
    pub detect_avg_ms: u64,
    pub detect_p95_ms: u64,
    pub materialize_avg_ms: u64,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_page(4);
        metrics.record_page(0);
        metrics.record_strategy_win("contour");
        metrics.record_strategy_win("contour");
        metrics.record_strategy_win("grid");
        metrics.record_strategy_error();
        metrics.record_detect_duration(Duration::from_millis(120));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pages_processed, 2);
        assert_eq!(snapshot.pages_empty, 1);
        assert_eq!(snapshot.panels_total, 4);
        assert_eq!(snapshot.strategy_wins["contour"], 2);
        assert_eq!(snapshot.strategy_wins["grid"], 1);
        assert_eq!(snapshot.strategy_errors, 1);
        assert_eq!(snapshot.detect_avg_ms, 120);
    }

    #[test]
    fn test_empty_duration_averages() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.crop_avg_ms, 0);
        assert_eq!(snapshot.detect_p95_ms, 0);
    }
}

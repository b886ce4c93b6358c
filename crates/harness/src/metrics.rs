use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use upbench_engine::throughput_mbps;
use upbench_sysprobe::ProcessProbe;

/// Sentinel reported when process CPU usage cannot be sampled.
pub const CPU_UNAVAILABLE: f64 = -1.0;

/// Metrics derived from one collection session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub duration_ms: u64,
    /// Process CPU usage over the session in percent, or [`CPU_UNAVAILABLE`].
    pub cpu_percent: f64,
    pub peak_memory_mb: u64,
    pub throughput_mbps: f64,
    pub success_rate: f64,
}

/// Accumulates counters for one benchmark collection session.
///
/// Counters are atomics so attempts running on worker threads can record
/// without coordination. Peak memory is a monotonic maximum sampled on every
/// record call; it resets only on the next [`start`](Self::start).
pub struct MetricsCollector {
    started_at: Mutex<Instant>,
    successes: AtomicU64,
    attempts: AtomicU64,
    bytes: AtomicU64,
    peak_rss: AtomicU64,
    probe: Mutex<ProcessProbe>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Mutex::new(Instant::now()),
            successes: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            peak_rss: AtomicU64::new(0),
            probe: Mutex::new(ProcessProbe::new()),
        }
    }

    /// Begins a new collection session, resetting all counters and priming
    /// the CPU baseline.
    pub fn start(&self) {
        *self.started_at.lock().unwrap() = Instant::now();
        self.successes.store(0, Ordering::Relaxed);
        self.attempts.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        self.peak_rss.store(0, Ordering::Relaxed);
        let _ = self.probe.lock().unwrap().cpu_percent();
        debug!("metrics collection started");
    }

    /// Records a successful upload of `bytes` bytes.
    pub fn record_success(&self, bytes: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.sample_memory();
    }

    /// Records a failed upload.
    pub fn record_failure(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.sample_memory();
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Ends the session and derives the metrics.
    pub fn end(&self) -> RunMetrics {
        let elapsed = self.started_at.lock().unwrap().elapsed();
        self.finish(elapsed)
    }

    fn finish(&self, elapsed: Duration) -> RunMetrics {
        let successes = self.successes.load(Ordering::Relaxed);
        let attempts = self.attempts.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);

        let success_rate = if attempts > 0 {
            successes as f64 / attempts as f64 * 100.0
        } else {
            0.0
        };
        let cpu_percent = self
            .probe
            .lock()
            .unwrap()
            .cpu_percent()
            .unwrap_or(CPU_UNAVAILABLE);

        RunMetrics {
            duration_ms: elapsed.as_millis() as u64,
            cpu_percent,
            peak_memory_mb: self.peak_rss.load(Ordering::Relaxed) / (1024 * 1024),
            throughput_mbps: throughput_mbps(bytes, elapsed),
            success_rate,
        }
    }

    /// Raises the peak-memory watermark to the current RSS if it grew.
    fn sample_memory(&self) {
        let Some(rss) = self.probe.lock().unwrap().rss_bytes() else {
            return;
        };
        let mut current = self.peak_rss.load(Ordering::Relaxed);
        while rss > current {
            match self.peak_rss.compare_exchange(
                current,
                rss,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
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

    const MB: u64 = 1024 * 1024;

    #[test]
    fn aggregates_successes_and_failures() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.record_success(10 * MB);
        collector.record_success(10 * MB);
        collector.record_success(10 * MB);
        collector.record_failure();

        // Three successes of 10 MB each and one failure over a 2-second
        // window: 75% success, 30 MB total, ~15 MB/s.
        let metrics = collector.finish(Duration::from_secs(2));
        assert!((metrics.success_rate - 75.0).abs() < 1e-9);
        assert_eq!(collector.total_bytes(), 30 * MB);
        assert!((metrics.throughput_mbps - 15.0).abs() < 1e-9);
        assert_eq!(metrics.duration_ms, 2000);
    }

    #[test]
    fn no_attempts_means_zero_rate() {
        let collector = MetricsCollector::new();
        collector.start();
        let metrics = collector.finish(Duration::from_secs(1));
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.throughput_mbps, 0.0);
    }

    #[test]
    fn start_resets_counters() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.record_success(MB);
        collector.start();
        let metrics = collector.finish(Duration::from_secs(1));
        assert_eq!(collector.total_bytes(), 0);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[test]
    fn throughput_floors_tiny_durations() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.record_success(MB);
        let metrics = collector.finish(Duration::ZERO);
        // Elapsed is floored, so throughput stays finite.
        assert!(metrics.throughput_mbps.is_finite());
        assert!(metrics.throughput_mbps > 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn peak_memory_is_sampled_on_record() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.record_success(MB);
        let metrics = collector.end();
        assert!(metrics.peak_memory_mb > 0);
    }

    #[test]
    fn metrics_serialize_camel_case() {
        let metrics = RunMetrics {
            duration_ms: 2000,
            cpu_percent: 12.5,
            peak_memory_mb: 64,
            throughput_mbps: 15.0,
            success_rate: 75.0,
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"durationMs\""));
        assert!(json.contains("\"successRate\""));
    }
}

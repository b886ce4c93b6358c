use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use upbench_protocol::ProgressSnapshot;

use crate::registry::SessionRegistry;

/// Default progress poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on polls per subscription, so an abandoned watcher never
/// ticks forever.
pub const MAX_PROGRESS_POLLS: usize = 100;

/// One update delivered to a progress subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// The session is live; carries the lifetime snapshot and a windowed
    /// transfer rate in MB/s.
    Active {
        snapshot: ProgressSnapshot,
        rate_mbps: f64,
    },
    /// The session is gone: completed, finalized, or cancelled.
    Completed,
}

/// Periodically polls a session's progress and delivers updates over a
/// channel until the session disappears or the poll bound is reached.
pub struct ProgressWatcher {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl ProgressWatcher {
    /// Creates a watcher with the given poll interval (500 ms by default).
    pub fn new(registry: Arc<SessionRegistry>, interval: Option<Duration>) -> Self {
        Self {
            registry,
            interval: interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Subscribes to a session's progress.
    ///
    /// The background task ends after sending [`ProgressUpdate::Completed`],
    /// after [`MAX_PROGRESS_POLLS`] polls, or when the receiver is dropped.
    pub fn watch(&self, session_id: &str) -> mpsc::Receiver<ProgressUpdate> {
        let (tx, rx) = mpsc::channel(16);
        let registry = Arc::clone(&self.registry);
        let session_id = session_id.to_string();
        let interval = self.interval;

        tokio::spawn(async move {
            let speed = SpeedCalculator::new(None, None);
            let mut last_bytes = 0u64;
            let mut ticker = tokio::time::interval(interval);

            for _ in 0..MAX_PROGRESS_POLLS {
                ticker.tick().await;
                match registry.progress(&session_id) {
                    Some(snapshot) => {
                        speed.add_sample(snapshot.bytes_received.saturating_sub(last_bytes));
                        last_bytes = snapshot.bytes_received;
                        let rate_mbps = speed.bytes_per_second() / (1024.0 * 1024.0);
                        if tx
                            .send(ProgressUpdate::Active {
                                snapshot,
                                rate_mbps,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    None => {
                        let _ = tx.send(ProgressUpdate::Completed).await;
                        return;
                    }
                }
            }
        });

        rx
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        // Prune samples outside the window.
        let cutoff = now - s.window_size;
        s.samples.retain(|sample| sample.timestamp >= cutoff);

        // Limit sample count.
        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        if s.samples.len() < 2 {
            return 0.0;
        }

        let first = &s.samples[0];
        let last = &s.samples[s.samples.len() - 1];
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total_bytes: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        let secs = remaining_bytes as f64 / speed;
        Some(Duration::from_secs_f64(secs))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap();
        s.samples.clear();
    }
}

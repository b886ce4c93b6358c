use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::runner::{BenchmarkRunner, RunOutcome};

/// Timing of scheduled benchmark runs.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Delay before the first run, giving the process time to settle.
    pub initial_delay: Duration,
    /// Re-run period after the first run; `None` runs once.
    pub period: Option<Duration>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            period: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

/// Owns the timer task that triggers benchmark runs.
///
/// `start` spawns the task; `stop` cancels it. Overlap is impossible: the
/// runner's own single-flight flag turns a trigger that lands during a live
/// run into a no-op.
pub struct BenchmarkScheduler {
    runner: Arc<BenchmarkRunner>,
    cancel: CancellationToken,
}

impl BenchmarkScheduler {
    pub fn new(runner: Arc<BenchmarkRunner>) -> Self {
        Self {
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the timer task. Call at most once per scheduler.
    pub fn start(&self, config: ScheduleConfig) {
        let runner = Arc::clone(&self.runner);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(config.initial_delay) => {}
            }
            run_once(&runner).await;

            let Some(period) = config.period else {
                return;
            };
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("benchmark scheduler stopped");
                        return;
                    }
                    _ = tokio::time::sleep(period) => run_once(&runner).await,
                }
            }
        });
    }

    /// Cancels the timer task. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn run_once(runner: &Arc<BenchmarkRunner>) {
    match runner.run().await {
        Ok(RunOutcome::Completed(_)) => {}
        Ok(RunOutcome::Busy) => info!("scheduled benchmark skipped, run already in progress"),
        Err(e) => error!(error = %e, "scheduled benchmark run failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerConfig;
    use crate::testfiles::ensure_test_files;
    use std::time::Duration;
    use tempfile::TempDir;
    use upbench_engine::UploadEngine;
    use upbench_protocol::StrategyKind;

    fn runner(dir: &TempDir) -> Arc<BenchmarkRunner> {
        let engine = Arc::new(UploadEngine::new(dir.path().join("uploads")).unwrap());
        let config = RunnerConfig {
            strategies: vec![StrategyKind::Multipart],
            file_sizes_mb: vec![1],
            iterations: 1,
            cooldown: Duration::ZERO,
            test_files_dir: dir.path().join("test-files"),
            output_dir: dir.path().join("results"),
            server_label: "embedded".into(),
        };
        Arc::new(BenchmarkRunner::new(config, engine))
    }

    fn has_report(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path().join("results"))
            .map(|mut d| d.next().is_some())
            .unwrap_or(false)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_after_initial_delay() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        ensure_test_files(&runner.config().test_files_dir, &[1]).unwrap();

        let scheduler = BenchmarkScheduler::new(Arc::clone(&runner));
        scheduler.start(ScheduleConfig {
            initial_delay: Duration::from_millis(10),
            period: None,
        });

        for _ in 0..1000 {
            if has_report(&dir) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(has_report(&dir));
        scheduler.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_before_delay_prevents_run() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        ensure_test_files(&runner.config().test_files_dir, &[1]).unwrap();

        let scheduler = BenchmarkScheduler::new(Arc::clone(&runner));
        scheduler.start(ScheduleConfig {
            initial_delay: Duration::from_millis(200),
            period: None,
        });
        scheduler.stop();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!has_report(&dir));
        assert!(!runner.is_running());
    }
}

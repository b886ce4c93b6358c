use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use upbench_engine::UploadEngine;
use upbench_protocol::{SizeCategory, StrategyKind};

use crate::metrics::MetricsCollector;
use crate::report::{BenchmarkReport, BenchmarkResult, ReportGenerator, ResultConfig, SystemInfo};
use crate::strategy::run_upload;
use crate::testfiles::test_file_path;
use crate::HarnessError;

/// Benchmark run configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Strategies to exercise, in report order.
    pub strategies: Vec<StrategyKind>,
    /// Test file sizes in MB; each size is one matrix column.
    pub file_sizes_mb: Vec<u64>,
    /// Attempts per (strategy × size) cell.
    pub iterations: u32,
    /// Pause between iterations, so connection reuse effects do not skew
    /// the measurements.
    pub cooldown: Duration,
    pub test_files_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Label of the serving engine variant, recorded in every result.
    pub server_label: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::ALL.to_vec(),
            file_sizes_mb: vec![1, 10, 100],
            iterations: 3,
            cooldown: Duration::from_secs(1),
            test_files_dir: PathBuf::from("test-files"),
            output_dir: PathBuf::from("benchmark-results"),
            server_label: "embedded".into(),
        }
    }
}

/// Outcome of a [`BenchmarkRunner::run`] call.
#[derive(Debug)]
pub enum RunOutcome {
    /// Another run was already in progress; nothing was started.
    Busy,
    Completed(BenchmarkReport),
}

/// Outcome of a fire-and-forget [`BenchmarkRunner::trigger`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Busy,
}

/// Drives the benchmark matrix against the engine.
///
/// A run-in-progress flag guarantees at most one run executes at a time
/// process-wide; a second trigger reports busy immediately instead of
/// queuing.
pub struct BenchmarkRunner {
    config: RunnerConfig,
    engine: Arc<UploadEngine>,
    running: AtomicBool,
}

impl BenchmarkRunner {
    pub fn new(config: RunnerConfig, engine: Arc<UploadEngine>) -> Self {
        Self {
            config,
            engine,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs the full matrix, or reports busy if a run is already executing.
    pub async fn run(&self) -> Result<RunOutcome, HarnessError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("benchmark already in progress, ignoring trigger");
            return Ok(RunOutcome::Busy);
        }

        let result = self.execute().await;
        self.running.store(false, Ordering::SeqCst);
        result.map(RunOutcome::Completed)
    }

    /// Starts a run on a background task.
    pub fn trigger(self: &Arc<Self>) -> RunStatus {
        if self.is_running() {
            return RunStatus::Busy;
        }
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            match runner.run().await {
                Ok(RunOutcome::Busy) => {}
                Ok(RunOutcome::Completed(_)) => {}
                Err(e) => error!(error = %e, "benchmark run failed"),
            }
        });
        RunStatus::Started
    }

    async fn execute(&self) -> Result<BenchmarkReport, HarnessError> {
        info!("starting benchmark run");
        let started_at = Utc::now();

        // Test-file generation is a separate concern; a missing file is a
        // configuration error, caught before any strategy runs.
        for &size_mb in &self.config.file_sizes_mb {
            let path = test_file_path(&self.config.test_files_dir, size_mb);
            if !path.exists() {
                return Err(HarnessError::Configuration(format!(
                    "missing test file {} (generate test files first)",
                    path.display()
                )));
            }
        }

        let mut results = Vec::new();
        for &strategy in &self.config.strategies {
            for &size_mb in &self.config.file_sizes_mb {
                results.push(self.run_cell(strategy, size_mb).await?);
            }
        }

        let report = BenchmarkReport {
            started_at,
            ended_at: Utc::now(),
            results,
            system: SystemInfo::collect(),
        };

        let generator = ReportGenerator::new(&self.config.output_dir);
        let paths = generator.write(&report)?;
        info!(
            json = %paths.json.display(),
            "benchmark run completed"
        );
        info!("benchmark summary:\n{}", ReportGenerator::summary(&report));

        Ok(report)
    }

    /// One matrix cell: all iterations of a strategy against one file size.
    async fn run_cell(
        &self,
        strategy: StrategyKind,
        size_mb: u64,
    ) -> Result<BenchmarkResult, HarnessError> {
        let file = test_file_path(&self.config.test_files_dir, size_mb);
        let file_size = tokio::fs::metadata(&file).await?.len();

        info!(%strategy, size_mb, "benchmarking strategy");
        let collector = MetricsCollector::new();
        collector.start();
        let started_at = Utc::now();
        let mut last_error = None;

        for iteration in 1..=self.config.iterations {
            info!(%strategy, iteration, total = self.config.iterations, "benchmark attempt");
            match run_upload(&self.engine, strategy, &file).await {
                Ok(response) => collector.record_success(response.size),
                Err(e) => {
                    warn!(%strategy, iteration, error = %e, "benchmark attempt failed");
                    collector.record_failure();
                    last_error = Some(e.to_string());
                }
            }
            if iteration < self.config.iterations {
                tokio::time::sleep(self.config.cooldown).await;
            }
        }

        Ok(BenchmarkResult {
            config: ResultConfig {
                strategy,
                server: self.config.server_label.clone(),
                size_category: SizeCategory::for_bytes(file_size),
            },
            metrics: collector.end(),
            file_size,
            started_at,
            ended_at: Utc::now(),
            error: last_error,
        })
    }
}

//! Benchmark harness for the upload engine.
//!
//! Drives a matrix of {strategy × file-size × iteration} against the live
//! engine, collects timing/throughput/resource metrics around each attempt,
//! and persists a structured report per run. At most one benchmark run
//! executes at a time process-wide.

mod metrics;
mod report;
mod runner;
mod scheduler;
mod strategy;
mod testfiles;

pub use metrics::{CPU_UNAVAILABLE, MetricsCollector, RunMetrics};
pub use report::{
    BenchmarkReport, BenchmarkResult, ReportGenerator, ReportPaths, ResultConfig, SystemInfo,
};
pub use runner::{BenchmarkRunner, RunOutcome, RunStatus, RunnerConfig};
pub use scheduler::{BenchmarkScheduler, ScheduleConfig};
pub use strategy::{CHUNK_WORKERS, MULTIPLEX_STREAMS, run_upload};
pub use testfiles::{ensure_test_files, test_file_path};

use upbench_engine::EngineError;

/// Errors produced by the benchmark harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("upload worker failed: {0}")]
    Worker(String),
}

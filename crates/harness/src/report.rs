use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use upbench_protocol::{SizeCategory, StrategyKind};

use crate::HarnessError;
use crate::metrics::RunMetrics;

/// Configuration a result was measured under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultConfig {
    pub strategy: StrategyKind,
    /// Label of the serving engine variant.
    pub server: String,
    pub size_category: SizeCategory,
}

/// Outcome of one benchmark cell (strategy × file size), aggregated over its
/// iterations. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub config: ResultConfig,
    pub metrics: RunMetrics,
    pub file_size: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Host metadata recorded with every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub host: String,
    pub cpu_count: usize,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// A complete benchmark run: ordered results plus system metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub results: Vec<BenchmarkResult>,
    pub system: SystemInfo,
}

/// Artifact paths written for one run.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Serializes benchmark reports to durable storage.
///
/// Each run produces one structured JSON document and one flat CSV, both
/// named with the run timestamp. The human-readable summary goes to the
/// process log only.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Persists the report, returning the artifact paths.
    pub fn write(&self, report: &BenchmarkReport) -> Result<ReportPaths, HarnessError> {
        fs::create_dir_all(&self.output_dir)?;

        let stamp = report.ended_at.format("%Y%m%d_%H%M%S");
        let json_path = self.output_dir.join(format!("benchmark_report_{stamp}.json"));
        let csv_path = self.output_dir.join(format!("benchmark_report_{stamp}.csv"));

        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
        fs::write(&csv_path, Self::csv(report))?;

        info!(path = %json_path.display(), "saved JSON benchmark report");
        info!(path = %csv_path.display(), "saved CSV benchmark report");

        Ok(ReportPaths {
            json: json_path,
            csv: csv_path,
        })
    }

    /// Flat tabular form of the report.
    pub fn csv(report: &BenchmarkReport) -> String {
        let mut out = String::from(
            "Strategy,Server,Size Category,File Size (MB),Duration (ms),CPU (%),\
             Peak Memory (MB),Throughput (MB/s),Success Rate (%)\n",
        );
        for result in &report.results {
            let file_size_mb = result.file_size as f64 / (1024.0 * 1024.0);
            let _ = writeln!(
                out,
                "{},{},{},{:.2},{},{:.2},{},{:.2},{:.2}",
                result.config.strategy,
                result.config.server,
                result.config.size_category,
                file_size_mb,
                result.metrics.duration_ms,
                result.metrics.cpu_percent,
                result.metrics.peak_memory_mb,
                result.metrics.throughput_mbps,
                result.metrics.success_rate,
            );
        }
        out
    }

    /// Human-readable summary, grouped by strategy and by size category.
    pub fn summary(report: &BenchmarkReport) -> String {
        let mut out = String::new();
        let total_ms = (report.ended_at - report.started_at).num_milliseconds().max(0) as u64;

        out.push_str("=== BENCHMARK SUMMARY ===\n");
        let _ = writeln!(out, "Start time: {}", report.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "End time: {}", report.ended_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Total duration: {}", format_duration(total_ms));
        let _ = writeln!(
            out,
            "System: {} ({}), host {}, {} cpus",
            report.system.os, report.system.arch, report.system.host, report.system.cpu_count
        );
        out.push('\n');

        out.push_str("=== RESULTS BY STRATEGY ===\n");
        for strategy in StrategyKind::ALL {
            let group: Vec<_> = report
                .results
                .iter()
                .filter(|r| r.config.strategy == strategy)
                .collect();
            if group.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{strategy}: {}", strategy.description());
            let _ = writeln!(
                out,
                "  Average throughput: {:.2} MB/s",
                avg(group.iter().map(|r| r.metrics.throughput_mbps))
            );
            let _ = writeln!(
                out,
                "  Average success rate: {:.2}%",
                avg(group.iter().map(|r| r.metrics.success_rate))
            );
        }
        out.push('\n');

        out.push_str("=== RESULTS BY FILE SIZE ===\n");
        for category in [SizeCategory::Small, SizeCategory::Medium, SizeCategory::Large] {
            let group: Vec<_> = report
                .results
                .iter()
                .filter(|r| r.config.size_category == category)
                .collect();
            if group.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{category}: {}", category.description());
            let _ = writeln!(
                out,
                "  Average throughput: {:.2} MB/s",
                avg(group.iter().map(|r| r.metrics.throughput_mbps))
            );
            let _ = writeln!(
                out,
                "  Average success rate: {:.2}%",
                avg(group.iter().map(|r| r.metrics.success_rate))
            );
        }

        out
    }
}

fn avg(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m {}s", minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

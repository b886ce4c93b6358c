use serde::{Deserialize, Serialize};

/// One of the competing upload strategies.
///
/// The strategy set is fixed at compile time; the harness dispatches on this
/// enum rather than a runtime registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Single-shot upload: the whole body is buffered, then written once.
    Multipart,
    /// Raw streaming upload: the body is copied frame by frame.
    Streaming,
    /// Resumable chunked upload: init / chunk / complete, byte-range writes.
    Chunked,
    /// Parallel sub-streams sharing one session, reassembled in index order.
    Multiplexed,
}

impl StrategyKind {
    /// All strategies, in report order.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Multipart,
        StrategyKind::Streaming,
        StrategyKind::Chunked,
        StrategyKind::Multiplexed,
    ];

    /// The `processingType` tag reported in upload responses.
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::Multipart => "multipart",
            StrategyKind::Streaming => "streaming",
            StrategyKind::Chunked => "chunked",
            StrategyKind::Multiplexed => "multiplexed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::Multipart => "single-shot multipart upload, fully buffered",
            StrategyKind::Streaming => "raw streaming upload, copied frame by frame",
            StrategyKind::Chunked => "resumable chunked upload with byte-range writes",
            StrategyKind::Multiplexed => "parallel sub-streams reassembled in index order",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// File-size tier a benchmark run classifies a test file into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * Self::MB;

    /// Classifies a file size in bytes.
    ///
    /// Small: under 10 MB. Medium: 10 MB up to 1 GB. Large: 1 GB and above.
    pub fn for_bytes(bytes: u64) -> Self {
        if bytes < 10 * Self::MB {
            SizeCategory::Small
        } else if bytes < Self::GB {
            SizeCategory::Medium
        } else {
            SizeCategory::Large
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SizeCategory::Small => "less than 10MB",
            SizeCategory::Medium => "10MB to 1GB",
            SizeCategory::Large => "1GB or more",
        }
    }
}

impl std::fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeCategory::Small => f.write_str("small"),
            SizeCategory::Medium => f.write_str("medium"),
            SizeCategory::Large => f.write_str("large"),
        }
    }
}

/// Point-in-time progress of a live upload session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub bytes_received: u64,
    pub elapsed_ms: u64,
    /// Lifetime average throughput in MB/s.
    pub throughput_mbps: f64,
}

/// Coarse status category a response adapter maps onto its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    NotFound,
    BadRequest,
    ServerError,
}

/// Structured error returned by every public engine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub category: ErrorCategory,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }
}

//! Upload session engine.
//!
//! Tracks in-flight file transfers, accepts out-of-order or parallel data
//! fragments, writes them durably into pre-allocated target files, detects
//! completion, and reconciles partial failure. Four write paths share the
//! same [`ChunkStore`] and [`SessionRegistry`]:
//!
//! - one-shot buffered and frame-streamed uploads ([`DirectUploader`]),
//! - resumable chunked sessions ([`ChunkedSessionManager`]),
//! - multiplexed parallel sub-streams ([`MultiplexedReassembler`]).
//!
//! Transport binding (HTTP routing, request parsing) is left to the caller;
//! every operation here is a synchronous call returning a result or a
//! structured error.

mod chunked;
mod direct;
mod multiplex;
mod progress;
mod registry;
mod session;
mod store;
mod validation;

pub use chunked::ChunkedSessionManager;
pub use direct::{BufferedOutcome, DirectUploader, StreamedOutcome};
pub use multiplex::{MultiplexedReassembler, StreamCompletion};
pub use progress::{
    DEFAULT_POLL_INTERVAL, MAX_PROGRESS_POLLS, ProgressUpdate, ProgressWatcher, SpeedCalculator,
};
pub use registry::SessionRegistry;
pub use session::{
    ChunkReceipt, ChunkedSession, CompletedUpload, InitiatedUpload, MultiplexedSession, Session,
    SizeDiscrepancy,
};
pub use store::ChunkStore;
pub use validation::sanitize_file_name;

use std::path::PathBuf;
use std::sync::Arc;

use upbench_protocol::{ErrorCategory, ProgressSnapshot};

/// Default chunk size clients are advised to use: 4 MiB.
///
/// Large enough to amortize per-chunk overhead, small enough that a retry
/// after a dropped connection loses little progress.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Elapsed-time floor used when deriving throughput, to avoid dividing by a
/// zero-length interval on very fast uploads.
pub const MIN_ELAPSED_SECS: f64 = 0.001;

/// Bytes transferred over elapsed wall-clock time, in MB/s.
pub fn throughput_mbps(bytes: u64, elapsed: std::time::Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
    (bytes as f64 / (1024.0 * 1024.0)) / secs
}

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload session not found: {0}")]
    SessionNotFound(String),

    #[error("upload session already exists: {0}")]
    SessionExists(String),

    #[error("chunk size mismatch: declared {declared}, received {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("write out of range: offset {offset} + {len} bytes exceeds allocated {capacity}")]
    OutOfRange { offset: u64, len: u64, capacity: u64 },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),
}

impl EngineError {
    /// Status category a response adapter should map this error onto.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::SessionNotFound(_) => ErrorCategory::NotFound,
            EngineError::SizeMismatch { .. }
            | EngineError::OutOfRange { .. }
            | EngineError::InvalidFileName(_) => ErrorCategory::BadRequest,
            EngineError::Io(_) | EngineError::SessionExists(_) => ErrorCategory::ServerError,
        }
    }

    /// Converts into the wire-level error envelope.
    pub fn to_body(&self) -> upbench_protocol::ErrorBody {
        upbench_protocol::ErrorBody::new(self.to_string(), self.category())
    }
}

/// Bundles the engine components over one uploads directory.
///
/// The registry is shared: chunked and multiplexed sessions live in the same
/// id namespace.
pub struct UploadEngine {
    store: Arc<ChunkStore>,
    registry: Arc<SessionRegistry>,
    chunked: ChunkedSessionManager,
    multiplexed: MultiplexedReassembler,
    direct: DirectUploader,
}

impl UploadEngine {
    /// Creates an engine rooted at `uploads_root`, creating the directory if
    /// needed.
    pub fn new(uploads_root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let store = Arc::new(ChunkStore::new(uploads_root)?);
        let registry = Arc::new(SessionRegistry::new());
        Ok(Self {
            chunked: ChunkedSessionManager::new(Arc::clone(&store), Arc::clone(&registry)),
            multiplexed: MultiplexedReassembler::new(Arc::clone(&store), Arc::clone(&registry)),
            direct: DirectUploader::new(Arc::clone(&store)),
            store,
            registry,
        })
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn chunked(&self) -> &ChunkedSessionManager {
        &self.chunked
    }

    pub fn multiplexed(&self) -> &MultiplexedReassembler {
        &self.multiplexed
    }

    pub fn direct(&self) -> &DirectUploader {
        &self.direct
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Snapshot of a live session's progress, or `None` once it is gone.
    pub fn progress(&self, session_id: &str) -> Option<ProgressSnapshot> {
        self.registry.progress(session_id)
    }
}

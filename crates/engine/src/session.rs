use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use upbench_protocol::ProgressSnapshot;

use crate::{EngineError, throughput_mbps};

/// Reply to a session initialization.
#[derive(Debug, Clone)]
pub struct InitiatedUpload {
    pub session_id: String,
    /// Stored file name: random id prefix plus the sanitized original name.
    pub file_name: String,
}

/// Receipt for one delivered chunk.
#[derive(Debug, Clone)]
pub struct ChunkReceipt {
    pub session_id: String,
    pub chunk_index: u32,
    /// `false` when this chunk index had already been received.
    pub first_receipt: bool,
}

/// Declared-versus-actual size annotation on a completed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeDiscrepancy {
    pub declared: u64,
    pub actual: u64,
}

/// Terminal result of a completed session.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub file_name: String,
    pub size: u64,
    pub elapsed: Duration,
    pub throughput_mbps: f64,
    /// Present when the actual file size differs from the declared total.
    /// A discrepancy is surfaced for observability, not treated as failure.
    pub size_mismatch: Option<SizeDiscrepancy>,
}

// ---------------------------------------------------------------------------
// Chunked session
// ---------------------------------------------------------------------------

/// A resumable chunked upload in progress.
///
/// The backing file is pre-allocated to the declared total size at init;
/// chunks land at arbitrary byte offsets in any order, any number of times.
pub struct ChunkedSession {
    id: String,
    file_name: String,
    target_path: PathBuf,
    total_size: u64,
    started_at: Instant,
    bytes_received: AtomicU64,
    received: Mutex<HashSet<u32>>,
}

impl ChunkedSession {
    pub fn new(id: String, file_name: String, target_path: PathBuf, total_size: u64) -> Self {
        Self {
            id,
            file_name,
            target_path,
            total_size,
            started_at: Instant::now(),
            bytes_received: AtomicU64::new(0),
            received: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Marks a chunk index as received. Re-receiving an index is a no-op;
    /// only the first receipt counts toward the byte total.
    pub fn record_chunk(&self, chunk_index: u32, len: u64) -> bool {
        let first = self.received.lock().unwrap().insert(chunk_index);
        if first {
            self.bytes_received.fetch_add(len, Ordering::Relaxed);
        }
        first
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Multiplexed session
// ---------------------------------------------------------------------------

/// A temporary extent accumulating one sub-stream's bytes.
///
/// Appends within one stream are serialized by the extent's own lock;
/// distinct streams write to distinct extents in parallel.
pub struct StreamExtent {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl StreamExtent {
    fn create(path: PathBuf) -> std::io::Result<Arc<Self>> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Arc::new(Self {
            path,
            file: Mutex::new(file),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `data` in caller-supplied order.
    pub fn append(&self, data: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap();
        file.write_all(data)
    }
}

struct MuxState {
    extents: HashMap<u32, Arc<StreamExtent>>,
    completed: HashSet<u32>,
    finalize_started: bool,
}

/// Outcome of a stream-completion signal, as seen by the session state.
pub(crate) enum StreamSignal {
    /// More streams outstanding.
    Pending { completed: u32, total: u32 },
    /// This signal was the last one: the caller must concatenate the extents
    /// (in index order; absent indices were announced but never written).
    Ready(Vec<Option<Arc<StreamExtent>>>),
    /// Finalization already ran or is running.
    Closed,
}

/// N parallel logical streams sharing one session.
///
/// Each stream appends to its own extent; when every stream has signaled
/// completion the extents are concatenated, in index order, into the target
/// file. Finalization triggers exactly once.
pub struct MultiplexedSession {
    id: String,
    file_name: String,
    target_path: PathBuf,
    total_streams: u32,
    started_at: Instant,
    bytes_received: AtomicU64,
    state: Mutex<MuxState>,
}

impl MultiplexedSession {
    /// Creates a session expecting `total_streams` sub-streams (at least one).
    pub fn new(id: String, file_name: String, target_path: PathBuf, total_streams: u32) -> Self {
        Self {
            id,
            file_name,
            target_path,
            total_streams: total_streams.max(1),
            started_at: Instant::now(),
            bytes_received: AtomicU64::new(0),
            state: Mutex::new(MuxState {
                extents: HashMap::new(),
                completed: HashSet::new(),
                finalize_started: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn total_streams(&self) -> u32 {
        self.total_streams
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn completed_streams(&self) -> u32 {
        self.state.lock().unwrap().completed.len() as u32
    }

    pub(crate) fn add_bytes(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the extent for `stream_index`, creating it lazily under
    /// `root` on first use. Fails once finalization has started.
    pub(crate) fn extent(&self, stream_index: u32, root: &Path) -> Result<Arc<StreamExtent>, EngineError> {
        let mut state = self.state.lock().unwrap();
        if state.finalize_started {
            return Err(EngineError::SessionNotFound(self.id.clone()));
        }
        if let Some(extent) = state.extents.get(&stream_index) {
            return Ok(Arc::clone(extent));
        }
        let path = root.join(format!("{}_stream_{}.tmp", self.id, stream_index));
        let extent = StreamExtent::create(path)?;
        state.extents.insert(stream_index, Arc::clone(&extent));
        Ok(extent)
    }

    /// Records a stream-completion signal.
    pub(crate) fn complete_stream(&self, stream_index: u32) -> StreamSignal {
        let mut state = self.state.lock().unwrap();
        if state.finalize_started {
            return StreamSignal::Closed;
        }
        state.completed.insert(stream_index);
        if state.completed.len() as u32 == self.total_streams {
            state.finalize_started = true;
            StreamSignal::Ready(self.take_extents(&mut state))
        } else {
            StreamSignal::Pending {
                completed: state.completed.len() as u32,
                total: self.total_streams,
            }
        }
    }

    /// Claims the extents for an explicit finalization, regardless of how
    /// many streams have completed. Returns `None` if finalization already
    /// started.
    pub(crate) fn begin_finalize(&self) -> Option<Vec<Option<Arc<StreamExtent>>>> {
        let mut state = self.state.lock().unwrap();
        if state.finalize_started {
            return None;
        }
        state.finalize_started = true;
        Some(self.take_extents(&mut state))
    }

    fn take_extents(&self, state: &mut MuxState) -> Vec<Option<Arc<StreamExtent>>> {
        (0..self.total_streams)
            .map(|i| state.extents.remove(&i))
            .collect()
    }

    /// Builds the terminal result once the target file is assembled.
    pub(crate) fn completed(&self, size: u64) -> CompletedUpload {
        let elapsed = self.elapsed();
        CompletedUpload {
            file_name: self.file_name.clone(),
            size,
            elapsed,
            throughput_mbps: throughput_mbps(size, elapsed),
            size_mismatch: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session sum type
// ---------------------------------------------------------------------------

/// A live upload session of either kind.
#[derive(Clone)]
pub enum Session {
    Chunked(Arc<ChunkedSession>),
    Multiplexed(Arc<MultiplexedSession>),
}

impl Session {
    pub fn id(&self) -> &str {
        match self {
            Session::Chunked(s) => s.id(),
            Session::Multiplexed(s) => s.id(),
        }
    }

    pub fn bytes_received(&self) -> u64 {
        match self {
            Session::Chunked(s) => s.bytes_received(),
            Session::Multiplexed(s) => s.bytes_received(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Session::Chunked(s) => s.elapsed(),
            Session::Multiplexed(s) => s.elapsed(),
        }
    }

    /// Point-in-time progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        let bytes = self.bytes_received();
        let elapsed = self.elapsed();
        ProgressSnapshot {
            bytes_received: bytes,
            elapsed_ms: elapsed.as_millis() as u64,
            throughput_mbps: throughput_mbps(bytes, elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn chunked_records_first_receipt_only() {
        let s = ChunkedSession::new("s1".into(), "f.bin".into(), "/tmp/f.bin".into(), 100);
        assert!(s.record_chunk(0, 40));
        assert!(s.record_chunk(1, 60));
        assert!(!s.record_chunk(0, 40));
        assert_eq!(s.bytes_received(), 100);
        assert_eq!(s.received_count(), 2);
    }

    #[test]
    fn multiplexed_extents_are_lazy_and_cached() {
        let dir = TempDir::new().unwrap();
        let s = MultiplexedSession::new(
            "m1".into(),
            "m.bin".into(),
            dir.path().join("m.bin"),
            3,
        );
        let a = s.extent(1, dir.path()).unwrap();
        let b = s.extent(1, dir.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.path().ends_with("m1_stream_1.tmp"));
        // Only stream 1 has an extent.
        assert!(dir.path().join("m1_stream_1.tmp").exists());
        assert!(!dir.path().join("m1_stream_0.tmp").exists());
    }

    #[test]
    fn completion_signals_count_down() {
        let dir = TempDir::new().unwrap();
        let s = MultiplexedSession::new(
            "m1".into(),
            "m.bin".into(),
            dir.path().join("m.bin"),
            2,
        );
        match s.complete_stream(0) {
            StreamSignal::Pending { completed, total } => {
                assert_eq!((completed, total), (1, 2));
            }
            _ => panic!("expected pending"),
        }
        // Redundant signal for the same stream stays pending.
        assert!(matches!(
            s.complete_stream(0),
            StreamSignal::Pending { completed: 1, .. }
        ));
        assert!(matches!(s.complete_stream(1), StreamSignal::Ready(_)));
        // Any signal after finalization started is a no-op.
        assert!(matches!(s.complete_stream(1), StreamSignal::Closed));
        assert!(matches!(s.complete_stream(0), StreamSignal::Closed));
    }

    #[test]
    fn ready_extents_come_in_index_order() {
        let dir = TempDir::new().unwrap();
        let s = MultiplexedSession::new(
            "m1".into(),
            "m.bin".into(),
            dir.path().join("m.bin"),
            3,
        );
        // Write streams out of order; leave stream 1 without data.
        s.extent(2, dir.path()).unwrap();
        s.extent(0, dir.path()).unwrap();
        s.complete_stream(2);
        s.complete_stream(0);
        let extents = match s.complete_stream(1) {
            StreamSignal::Ready(e) => e,
            _ => panic!("expected ready"),
        };
        assert_eq!(extents.len(), 3);
        assert!(extents[0].is_some());
        assert!(extents[1].is_none());
        assert!(extents[2].is_some());
    }

    #[test]
    fn begin_finalize_claims_once() {
        let dir = TempDir::new().unwrap();
        let s = MultiplexedSession::new(
            "m1".into(),
            "m.bin".into(),
            dir.path().join("m.bin"),
            2,
        );
        assert!(s.begin_finalize().is_some());
        assert!(s.begin_finalize().is_none());
        // Writes after finalization fail.
        assert!(matches!(
            s.extent(0, dir.path()),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn stream_count_is_at_least_one() {
        let dir = TempDir::new().unwrap();
        let s = MultiplexedSession::new(
            "m1".into(),
            "m.bin".into(),
            dir.path().join("m.bin"),
            0,
        );
        assert_eq!(s.total_streams(), 1);
    }

    #[test]
    fn session_progress_snapshot() {
        let s = Session::Chunked(Arc::new(ChunkedSession::new(
            "s1".into(),
            "f.bin".into(),
            "/tmp/f.bin".into(),
            100,
        )));
        if let Session::Chunked(inner) = &s {
            inner.record_chunk(0, 100);
        }
        let p = s.progress();
        assert_eq!(p.bytes_received, 100);
        assert!(p.throughput_mbps > 0.0);
    }
}

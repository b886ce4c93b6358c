use std::fs::{self, File, OpenOptions};
use std::io;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::registry::SessionRegistry;
use crate::session::{CompletedUpload, MultiplexedSession, StreamExtent, StreamSignal};
use crate::store::ChunkStore;
use crate::EngineError;

/// Outcome of a stream-completion signal.
#[derive(Debug)]
pub enum StreamCompletion {
    /// Streams are still outstanding.
    Pending {
        completed_streams: u32,
        total_streams: u32,
    },
    /// This signal was the last one and finalization ran.
    Finalized(CompletedUpload),
    /// The session has already been finalized (or never existed); redundant
    /// signals are no-ops, never errors.
    AlreadyClosed,
}

/// Orchestrates N parallel logical streams sharing one session.
///
/// Each stream appends to its own temporary extent; once every stream has
/// signaled end-of-stream, the extents are concatenated into the target file
/// in stream-index order (never arrival order) and deleted. Finalization
/// runs exactly once per session.
///
/// An I/O failure during a stream write or finalization fails that request
/// and leaves the session and its extents in place for inspection; nothing
/// is cleaned up implicitly.
pub struct MultiplexedReassembler {
    store: Arc<ChunkStore>,
    registry: Arc<SessionRegistry>,
}

impl MultiplexedReassembler {
    pub fn new(store: Arc<ChunkStore>, registry: Arc<SessionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Returns the session for `session_id`, creating it on first use.
    ///
    /// The `total_streams` value announced by whichever caller arrives first
    /// wins; later differing announcements are ignored.
    pub fn open_session(
        &self,
        session_id: &str,
        total_streams: u32,
    ) -> Result<Arc<MultiplexedSession>, EngineError> {
        let session = self.registry.get_or_create_multiplexed(session_id, || {
            let stored_name = format!("{}_multiplexed.bin", Uuid::new_v4());
            let target_path = self.store.path_for(&stored_name);
            info!(
                session = %session_id,
                total_streams,
                "multiplexed upload session opened"
            );
            Arc::new(MultiplexedSession::new(
                session_id.to_string(),
                stored_name,
                target_path,
                total_streams,
            ))
        })?;

        if session.total_streams() != total_streams.max(1) {
            debug!(
                session = %session_id,
                announced = total_streams,
                effective = session.total_streams(),
                "ignoring divergent stream count announcement"
            );
        }
        Ok(session)
    }

    /// Appends `data` to the extent of `stream_index`, creating the extent
    /// lazily on first use.
    ///
    /// Calls for distinct stream indices proceed in parallel; calls for the
    /// same index are serialized, preserving caller-supplied order.
    pub fn write_stream(
        &self,
        session_id: &str,
        stream_index: u32,
        data: &[u8],
    ) -> Result<(), EngineError> {
        let session = self.registry.get_multiplexed(session_id)?;
        let extent = session.extent(stream_index, self.store.root())?;
        extent.append(data)?;
        session.add_bytes(data.len() as u64);
        debug!(
            session = %session_id,
            stream = stream_index,
            size = data.len(),
            "stream fragment received"
        );
        Ok(())
    }

    /// Records an end-of-stream signal for `stream_index`.
    ///
    /// When the signal is the last outstanding one, the extents are
    /// concatenated into the target file and the session is released.
    pub fn complete_stream(
        &self,
        session_id: &str,
        stream_index: u32,
    ) -> Result<StreamCompletion, EngineError> {
        let session = match self.registry.get_multiplexed(session_id) {
            Ok(s) => s,
            // After finalization the session is gone, so a redundant signal
            // is indistinguishable from an unknown id; neither is an error.
            Err(EngineError::SessionNotFound(_)) => return Ok(StreamCompletion::AlreadyClosed),
            Err(e) => return Err(e),
        };

        match session.complete_stream(stream_index) {
            StreamSignal::Pending { completed, total } => Ok(StreamCompletion::Pending {
                completed_streams: completed,
                total_streams: total,
            }),
            StreamSignal::Ready(extents) => {
                let result = self.concatenate(&session, extents)?;
                self.registry.remove(session_id);
                Ok(StreamCompletion::Finalized(result))
            }
            StreamSignal::Closed => Ok(StreamCompletion::AlreadyClosed),
        }
    }

    /// Explicitly finalizes a session, concatenating whatever extents exist.
    ///
    /// A second finalization attempt, explicit or via a completion signal,
    /// is a no-op reported as [`StreamCompletion::AlreadyClosed`].
    pub fn finalize(&self, session_id: &str) -> Result<StreamCompletion, EngineError> {
        let session = match self.registry.get_multiplexed(session_id) {
            Ok(s) => s,
            Err(EngineError::SessionNotFound(_)) => return Ok(StreamCompletion::AlreadyClosed),
            Err(e) => return Err(e),
        };

        match session.begin_finalize() {
            Some(extents) => {
                let result = self.concatenate(&session, extents)?;
                self.registry.remove(session_id);
                Ok(StreamCompletion::Finalized(result))
            }
            None => Ok(StreamCompletion::AlreadyClosed),
        }
    }

    /// Appends each extent's content to the target file in index order,
    /// deleting extents as they are consumed. Indices that never received
    /// data are skipped.
    fn concatenate(
        &self,
        session: &MultiplexedSession,
        extents: Vec<Option<Arc<StreamExtent>>>,
    ) -> Result<CompletedUpload, EngineError> {
        let mut target = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(session.target_path())?;

        for extent in extents.into_iter().flatten() {
            let mut source = File::open(extent.path())?;
            io::copy(&mut source, &mut target)?;
            fs::remove_file(extent.path())?;
        }

        let size = target.metadata()?.len();
        let result = session.completed(size);
        info!(
            session = %session.id(),
            size,
            streams = session.total_streams(),
            "multiplexed upload finalized"
        );
        Ok(result)
    }
}

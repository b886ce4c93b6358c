use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::SessionRegistry;
use crate::session::{
    ChunkReceipt, ChunkedSession, CompletedUpload, InitiatedUpload, Session, SizeDiscrepancy,
};
use crate::store::ChunkStore;
use crate::validation::sanitize_file_name;
use crate::{EngineError, throughput_mbps};

/// Orchestrates resumable chunked uploads.
///
/// A session starts with `init`, which pre-allocates the backing file to the
/// declared total size; chunks then land at their byte offsets in any order,
/// concurrently, until the caller either completes or cancels the session.
pub struct ChunkedSessionManager {
    store: Arc<ChunkStore>,
    registry: Arc<SessionRegistry>,
}

impl ChunkedSessionManager {
    pub fn new(store: Arc<ChunkStore>, registry: Arc<SessionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Opens a new session for a file of `total_size` bytes.
    ///
    /// The backing file is created and sized immediately, so allocation
    /// failures (disk full, permissions) surface here rather than on the
    /// first chunk.
    pub fn init(&self, file_name: &str, total_size: u64) -> Result<InitiatedUpload, EngineError> {
        let original = sanitize_file_name(file_name)?;
        let session_id = Uuid::new_v4().to_string();
        let stored_name = format!("{}_{}", Uuid::new_v4(), original);
        let target_path = self.store.path_for(&stored_name);

        self.store.allocate(&target_path, total_size)?;

        let session = Arc::new(ChunkedSession::new(
            session_id.clone(),
            stored_name.clone(),
            target_path,
            total_size,
        ));
        self.registry.create(Session::Chunked(session))?;

        info!(
            session = %session_id,
            file = %original,
            total_size,
            "chunked upload session opened"
        );

        Ok(InitiatedUpload {
            session_id,
            file_name: stored_name,
        })
    }

    /// Writes one chunk at its byte offset and records its index.
    ///
    /// Chunks may arrive in any order and any number of times; re-receiving
    /// an index leaves the file unchanged.
    pub fn put_chunk(
        &self,
        session_id: &str,
        chunk_index: u32,
        start_byte: u64,
        declared_size: u64,
        data: &[u8],
    ) -> Result<ChunkReceipt, EngineError> {
        let session = self.registry.get_chunked(session_id)?;

        if data.len() as u64 != declared_size {
            return Err(EngineError::SizeMismatch {
                declared: declared_size,
                actual: data.len() as u64,
            });
        }

        self.store
            .write_at(session.target_path(), start_byte, data)?;
        let first_receipt = session.record_chunk(chunk_index, data.len() as u64);

        debug!(
            session = %session_id,
            chunk = chunk_index,
            start_byte,
            size = data.len(),
            "chunk received"
        );

        Ok(ChunkReceipt {
            session_id: session_id.to_string(),
            chunk_index,
            first_receipt,
        })
    }

    /// Completes a session: reports elapsed time and throughput, releases
    /// the session, and leaves the backing file in place.
    ///
    /// A mismatch between the declared total and the actual file size is a
    /// warning annotation on a successful result, not a failure: the
    /// declared size was authoritative for allocation, the actual size is
    /// informational.
    pub fn complete(&self, session_id: &str) -> Result<CompletedUpload, EngineError> {
        let session = self.registry.get_chunked(session_id)?;

        let actual = self.store.size(session.target_path())?;
        let size_mismatch = if actual != session.total_size() {
            warn!(
                session = %session_id,
                declared = session.total_size(),
                actual,
                "completed upload size differs from declared total"
            );
            Some(SizeDiscrepancy {
                declared: session.total_size(),
                actual,
            })
        } else {
            None
        };

        let elapsed = session.elapsed();
        self.registry.remove(session_id);

        info!(
            session = %session_id,
            size = actual,
            elapsed_ms = elapsed.as_millis() as u64,
            "chunked upload completed"
        );

        Ok(CompletedUpload {
            file_name: session.file_name().to_string(),
            size: actual,
            elapsed,
            throughput_mbps: throughput_mbps(actual, elapsed),
            size_mismatch,
        })
    }

    /// Cancels a session: deletes the backing file and releases the session.
    pub fn cancel(&self, session_id: &str) -> Result<(), EngineError> {
        let session = self.registry.get_chunked(session_id)?;
        self.store.delete(session.target_path())?;
        self.registry.remove(session_id);
        info!(session = %session_id, "chunked upload cancelled");
        Ok(())
    }
}

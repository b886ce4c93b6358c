use std::fs::File;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use crate::store::ChunkStore;
use crate::validation::sanitize_file_name;
use crate::{EngineError, throughput_mbps};

/// Frame size used by the streamed write path: 16 KiB, the typical HTTP/2
/// DATA frame payload.
pub const FRAME_SIZE: usize = 16 * 1024;

/// Result of a buffered one-shot upload.
#[derive(Debug, Clone)]
pub struct BufferedOutcome {
    pub file_name: String,
    pub size: u64,
    pub elapsed: std::time::Duration,
    pub throughput_mbps: f64,
}

/// Result of a frame-streamed upload.
#[derive(Debug, Clone)]
pub struct StreamedOutcome {
    pub file_name: String,
    pub size: u64,
    pub elapsed: std::time::Duration,
    pub throughput_mbps: f64,
    pub frames: u64,
    pub avg_frame_size: u64,
}

/// One-shot write paths: a fully buffered body written at once, and a
/// frame-by-frame streamed copy.
///
/// Neither path registers a session; the upload starts and finishes within
/// a single call.
pub struct DirectUploader {
    store: Arc<ChunkStore>,
}

impl DirectUploader {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }

    /// Writes an already-buffered body to a fresh file.
    pub fn store_buffered(
        &self,
        file_name: &str,
        data: &[u8],
    ) -> Result<BufferedOutcome, EngineError> {
        let started = Instant::now();
        let original = sanitize_file_name(file_name)?;
        let stored_name = format!("{}_{}", Uuid::new_v4(), original);
        let path = self.store.path_for(&stored_name);

        let mut file = File::create(&path)?;
        file.write_all(data)?;

        let elapsed = started.elapsed();
        let size = data.len() as u64;
        info!(
            file = %stored_name,
            size,
            elapsed_ms = elapsed.as_millis() as u64,
            "buffered upload stored"
        );
        Ok(BufferedOutcome {
            file_name: stored_name,
            size,
            elapsed,
            throughput_mbps: throughput_mbps(size, elapsed),
        })
    }

    /// Copies a body to a fresh file frame by frame, counting frames.
    pub fn store_streamed<R: Read>(
        &self,
        file_name: &str,
        mut body: R,
    ) -> Result<StreamedOutcome, EngineError> {
        let started = Instant::now();
        let original = sanitize_file_name(file_name)?;
        let stored_name = format!("{}_{}", Uuid::new_v4(), original);
        let path = self.store.path_for(&stored_name);

        let mut file = File::create(&path)?;
        let mut buffer = vec![0u8; FRAME_SIZE];
        let mut size = 0u64;
        let mut frames = 0u64;

        loop {
            let n = body.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            size += n as u64;
            frames += 1;
            if frames % 100 == 0 {
                debug!(file = %stored_name, frames, size, "streaming upload in progress");
            }
        }

        let elapsed = started.elapsed();
        info!(
            file = %stored_name,
            size,
            frames,
            elapsed_ms = elapsed.as_millis() as u64,
            "streamed upload stored"
        );
        Ok(StreamedOutcome {
            file_name: stored_name,
            size,
            elapsed,
            throughput_mbps: throughput_mbps(size, elapsed),
            frames,
            avg_frame_size: if frames > 0 { size / frames } else { 0 },
        })
    }
}

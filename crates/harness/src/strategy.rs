use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tokio::task;
use uuid::Uuid;

use upbench_engine::{
    BufferedOutcome, CompletedUpload, DEFAULT_CHUNK_SIZE, StreamCompletion, StreamedOutcome,
    UploadEngine,
};
use upbench_protocol::{StrategyKind, UploadResponse};

use crate::HarnessError;

/// Worker tasks a chunked attempt spreads its chunk writes across.
pub const CHUNK_WORKERS: usize = 4;

/// Sub-streams a multiplexed attempt splits the file into.
pub const MULTIPLEX_STREAMS: u32 = 4;

/// Write granularity of a multiplexed sub-stream.
const STREAM_WRITE_SIZE: u64 = 64 * 1024;

/// Executes one end-to-end upload of `file` using the given strategy.
pub async fn run_upload(
    engine: &Arc<UploadEngine>,
    strategy: StrategyKind,
    file: &Path,
) -> Result<UploadResponse, HarnessError> {
    match strategy {
        StrategyKind::Multipart => multipart_upload(engine, file).await,
        StrategyKind::Streaming => streaming_upload(engine, file).await,
        StrategyKind::Chunked => chunked_upload(engine, file, DEFAULT_CHUNK_SIZE).await,
        StrategyKind::Multiplexed => multiplexed_upload(engine, file, MULTIPLEX_STREAMS).await,
    }
}

async fn multipart_upload(
    engine: &Arc<UploadEngine>,
    file: &Path,
) -> Result<UploadResponse, HarnessError> {
    let data = tokio::fs::read(file).await?;
    let name = upload_name(file);
    let engine = Arc::clone(engine);
    let outcome = task::spawn_blocking(move || engine.direct().store_buffered(&name, &data))
        .await
        .map_err(join_error)??;
    Ok(buffered_response(outcome, StrategyKind::Multipart))
}

async fn streaming_upload(
    engine: &Arc<UploadEngine>,
    file: &Path,
) -> Result<UploadResponse, HarnessError> {
    let name = upload_name(file);
    let path = file.to_path_buf();
    let engine = Arc::clone(engine);
    let outcome = task::spawn_blocking(move || {
        let body = std::fs::File::open(&path)?;
        engine.direct().store_streamed(&name, body)
    })
    .await
    .map_err(join_error)??;
    Ok(streamed_response(outcome))
}

async fn chunked_upload(
    engine: &Arc<UploadEngine>,
    file: &Path,
    chunk_size: u64,
) -> Result<UploadResponse, HarnessError> {
    let size = tokio::fs::metadata(file).await?.len();
    let name = upload_name(file);

    let init = {
        let engine = Arc::clone(engine);
        task::spawn_blocking(move || engine.chunked().init(&name, size))
            .await
            .map_err(join_error)??
    };

    // Independent byte-range writes let the chunk workers proceed out of
    // order and in parallel.
    let ranges = chunk_ranges(size, chunk_size);
    let mut workers = Vec::new();
    for w in 0..CHUNK_WORKERS {
        let chunks: Vec<_> = ranges.iter().skip(w).step_by(CHUNK_WORKERS).copied().collect();
        if chunks.is_empty() {
            continue;
        }
        let engine = Arc::clone(engine);
        let session_id = init.session_id.clone();
        let path = file.to_path_buf();
        workers.push(task::spawn_blocking(move || -> Result<(), HarnessError> {
            let mut source = std::fs::File::open(&path)?;
            for (index, start, len) in chunks {
                let mut buf = vec![0u8; len as usize];
                source.seek(SeekFrom::Start(start))?;
                source.read_exact(&mut buf)?;
                engine
                    .chunked()
                    .put_chunk(&session_id, index, start, len, &buf)?;
            }
            Ok(())
        }));
    }
    for worker in workers {
        worker.await.map_err(join_error)??;
    }

    let done = {
        let engine = Arc::clone(engine);
        let session_id = init.session_id;
        task::spawn_blocking(move || engine.chunked().complete(&session_id))
            .await
            .map_err(join_error)??
    };
    Ok(completed_response(done, StrategyKind::Chunked))
}

async fn multiplexed_upload(
    engine: &Arc<UploadEngine>,
    file: &Path,
    streams: u32,
) -> Result<UploadResponse, HarnessError> {
    let size = tokio::fs::metadata(file).await?.len();
    let session_id = Uuid::new_v4().to_string();
    engine.multiplexed().open_session(&session_id, streams)?;

    let mut workers = Vec::new();
    for stream_index in 0..streams {
        let (start, len) = stream_segment(size, streams, stream_index);
        let engine = Arc::clone(engine);
        let session_id = session_id.clone();
        let path = file.to_path_buf();
        workers.push(task::spawn_blocking(
            move || -> Result<Option<CompletedUpload>, HarnessError> {
                let mut source = std::fs::File::open(&path)?;
                source.seek(SeekFrom::Start(start))?;
                let mut remaining = len;
                let mut buf = vec![0u8; STREAM_WRITE_SIZE as usize];
                while remaining > 0 {
                    let take = remaining.min(STREAM_WRITE_SIZE) as usize;
                    source.read_exact(&mut buf[..take])?;
                    engine
                        .multiplexed()
                        .write_stream(&session_id, stream_index, &buf[..take])?;
                    remaining -= take as u64;
                }
                match engine.multiplexed().complete_stream(&session_id, stream_index)? {
                    StreamCompletion::Finalized(done) => Ok(Some(done)),
                    _ => Ok(None),
                }
            },
        ));
    }

    let mut finalized = None;
    for worker in workers {
        if let Some(done) = worker.await.map_err(join_error)?? {
            finalized = Some(done);
        }
    }
    let done = finalized
        .ok_or_else(|| HarnessError::Worker("multiplexed upload never finalized".into()))?;
    Ok(completed_response(done, StrategyKind::Multiplexed))
}

/// Contiguous byte segment stream `index` of `streams` carries.
fn stream_segment(size: u64, streams: u32, index: u32) -> (u64, u64) {
    let base = size / u64::from(streams);
    let start = base * u64::from(index);
    let len = if index == streams - 1 {
        size - start
    } else {
        base
    };
    (start, len)
}

fn chunk_ranges(size: u64, chunk_size: u64) -> Vec<(u32, u64, u64)> {
    let mut ranges = Vec::new();
    let mut offset = 0u64;
    let mut index = 0u32;
    while offset < size {
        let len = chunk_size.min(size - offset);
        ranges.push((index, offset, len));
        offset += len;
        index += 1;
    }
    ranges
}

fn upload_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".into())
}

fn join_error(e: task::JoinError) -> HarnessError {
    HarnessError::Worker(e.to_string())
}

fn completed_response(done: CompletedUpload, strategy: StrategyKind) -> UploadResponse {
    UploadResponse {
        file_name: done.file_name,
        size: done.size,
        upload_time_ms: done.elapsed.as_millis() as u64,
        throughput_mbps: done.throughput_mbps,
        processing_type: strategy.tag().to_string(),
        size_warning: done
            .size_mismatch
            .map(|m| format!("declared {} bytes, stored {}", m.declared, m.actual)),
        frames_processed: None,
    }
}

fn buffered_response(outcome: BufferedOutcome, strategy: StrategyKind) -> UploadResponse {
    UploadResponse {
        file_name: outcome.file_name,
        size: outcome.size,
        upload_time_ms: outcome.elapsed.as_millis() as u64,
        throughput_mbps: outcome.throughput_mbps,
        processing_type: strategy.tag().to_string(),
        size_warning: None,
        frames_processed: None,
    }
}

fn streamed_response(outcome: StreamedOutcome) -> UploadResponse {
    UploadResponse {
        file_name: outcome.file_name,
        size: outcome.size,
        upload_time_ms: outcome.elapsed.as_millis() as u64,
        throughput_mbps: outcome.throughput_mbps,
        processing_type: StrategyKind::Streaming.tag().to_string(),
        size_warning: None,
        frames_processed: Some(outcome.frames),
    }
}

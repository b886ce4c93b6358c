//! Wire types shared between the upload engine, the benchmark harness, and
//! whatever transport layer binds them to clients.
//!
//! All payloads serialize as camelCase JSON. Binary chunk data travels
//! base64-encoded inside JSON payloads (see [`messages`]).

pub mod messages;
pub mod types;

pub use messages::{
    ChunkAck, ChunkUploadRequest, InitUploadRequest, InitUploadResponse, StreamAck,
    StreamDataRequest, UploadResponse,
};
pub use types::{ErrorBody, ErrorCategory, ProgressSnapshot, SizeCategory, StrategyKind};

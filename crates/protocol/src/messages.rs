use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Starts a new chunked upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub file_name: String,
    pub total_size: u64,
    /// Chunk size the client intends to use (informational).
    pub chunk_size: u64,
}

/// Delivers one chunk of an active session.
///
/// The `data` field is base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadRequest {
    pub session_id: String,
    pub chunk_index: u32,
    pub start_byte: u64,
    pub declared_size: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Delivers a fragment of one multiplexed sub-stream.
///
/// `total_streams` from the first fragment of a session wins; later values
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDataRequest {
    pub session_id: String,
    pub stream_index: u32,
    pub total_streams: u32,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Reply to [`InitUploadRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub session_id: String,
    /// Stored file name (random id prefix plus the sanitized original name).
    pub file_name: String,
}

/// Acknowledges one received chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub session_id: String,
    pub chunk_index: u32,
    pub received: bool,
}

/// Acknowledges a sub-stream completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAck {
    pub session_id: String,
    pub stream_index: u32,
    pub completed_streams: u32,
    pub total_streams: u32,
    pub finalized: bool,
}

/// Terminal result of a finished upload, whatever the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub size: u64,
    pub upload_time_ms: u64,
    pub throughput_mbps: f64,
    pub processing_type: String,
    /// Set when the actual file size differs from the declared total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_warning: Option<String>,
    /// Frame count for streamed uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_processed: Option<u64>,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_request_base64_roundtrip() {
        let req = ChunkUploadRequest {
            session_id: "s1".into(),
            chunk_index: 0,
            start_byte: 0,
            declared_size: 5,
            data: vec![0x48, 0x65, 0x6c, 0x6c, 0x6f],
        };
        let json = serde_json::to_string(&req).unwrap();
        // "Hello" = "SGVsbG8=" in base64.
        assert!(json.contains("SGVsbG8="));
        let parsed: ChunkUploadRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn stream_request_camel_case_fields() {
        let req = StreamDataRequest {
            session_id: "s1".into(),
            stream_index: 2,
            total_streams: 3,
            data: b"abc".to_vec(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"sessionId\""));
        assert!(json.contains("\"streamIndex\""));
        assert!(json.contains("\"totalStreams\""));
    }

    #[test]
    fn upload_response_omits_empty_options() {
        let resp = UploadResponse {
            file_name: "f.bin".into(),
            size: 10,
            upload_time_ms: 4,
            throughput_mbps: 2.5,
            processing_type: "chunked".into(),
            size_warning: None,
            frames_processed: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("sizeWarning"));
        assert!(!json.contains("framesProcessed"));
    }
}

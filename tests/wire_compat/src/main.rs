fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

// Pins the serialized JSON shape of every public wire type. Clients bind to
// these field names and enum tags; a mismatch here is a breaking protocol
// change, not a refactor.
#[cfg(test)]
mod tests {
    use serde_json::json;
    use upbench_harness::{BenchmarkResult, ResultConfig, RunMetrics};
    use upbench_protocol::{
        ChunkAck, ChunkUploadRequest, ErrorBody, ErrorCategory, InitUploadRequest,
        InitUploadResponse, ProgressSnapshot, SizeCategory, StrategyKind, StreamAck,
        StreamDataRequest, UploadResponse,
    };

    /// Serializes `value` and compares against the expected JSON, then
    /// deserializes the expected JSON back into the type.
    fn pin_shape<T>(value: &T, expected: serde_json::Value)
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let serialized = serde_json::to_value(value).expect("serialize");
        assert_eq!(serialized, expected, "serialized shape drifted");
        let _roundtrip: T = serde_json::from_value(expected).expect("deserialize");
    }

    #[test]
    fn init_upload_request() {
        pin_shape(
            &InitUploadRequest {
                file_name: "video.mp4".into(),
                total_size: 1_000_000,
                chunk_size: 4_194_304,
            },
            json!({
                "fileName": "video.mp4",
                "totalSize": 1_000_000,
                "chunkSize": 4_194_304,
            }),
        );
    }

    #[test]
    fn chunk_upload_request_encodes_base64() {
        pin_shape(
            &ChunkUploadRequest {
                session_id: "s1".into(),
                chunk_index: 2,
                start_byte: 8192,
                declared_size: 5,
                data: b"Hello".to_vec(),
            },
            json!({
                "sessionId": "s1",
                "chunkIndex": 2,
                "startByte": 8192,
                "declaredSize": 5,
                "data": "SGVsbG8=",
            }),
        );
    }

    #[test]
    fn init_upload_response() {
        pin_shape(
            &InitUploadResponse {
                session_id: "s1".into(),
                file_name: "ab12_video.mp4".into(),
            },
            json!({
                "sessionId": "s1",
                "fileName": "ab12_video.mp4",
            }),
        );
    }

    #[test]
    fn chunk_ack() {
        pin_shape(
            &ChunkAck {
                session_id: "s1".into(),
                chunk_index: 2,
                received: true,
            },
            json!({
                "sessionId": "s1",
                "chunkIndex": 2,
                "received": true,
            }),
        );
    }

    #[test]
    fn stream_data_request() {
        pin_shape(
            &StreamDataRequest {
                session_id: "m1".into(),
                stream_index: 1,
                total_streams: 4,
                data: b"abc".to_vec(),
            },
            json!({
                "sessionId": "m1",
                "streamIndex": 1,
                "totalStreams": 4,
                "data": "YWJj",
            }),
        );
    }

    #[test]
    fn stream_ack() {
        pin_shape(
            &StreamAck {
                session_id: "m1".into(),
                stream_index: 1,
                completed_streams: 2,
                total_streams: 4,
                finalized: false,
            },
            json!({
                "sessionId": "m1",
                "streamIndex": 1,
                "completedStreams": 2,
                "totalStreams": 4,
                "finalized": false,
            }),
        );
    }

    #[test]
    fn upload_response_with_annotations() {
        pin_shape(
            &UploadResponse {
                file_name: "abc_video.mp4".into(),
                size: 999_000,
                upload_time_ms: 740,
                throughput_mbps: 1.29,
                processing_type: "chunked".into(),
                size_warning: Some("declared 1000000 bytes, stored 999000".into()),
                frames_processed: None,
            },
            json!({
                "fileName": "abc_video.mp4",
                "size": 999_000,
                "uploadTimeMs": 740,
                "throughputMbps": 1.29,
                "processingType": "chunked",
                "sizeWarning": "declared 1000000 bytes, stored 999000",
            }),
        );
    }

    #[test]
    fn progress_snapshot() {
        pin_shape(
            &ProgressSnapshot {
                bytes_received: 4096,
                elapsed_ms: 120,
                throughput_mbps: 0.03,
            },
            json!({
                "bytesReceived": 4096,
                "elapsedMs": 120,
                "throughputMbps": 0.03,
            }),
        );
    }

    #[test]
    fn error_body_categories() {
        pin_shape(
            &ErrorBody::new("upload session not found: s1", ErrorCategory::NotFound),
            json!({
                "message": "upload session not found: s1",
                "category": "not-found",
            }),
        );
    }

    #[test]
    fn benchmark_result_shape() {
        let started = "2026-08-05T10:00:00Z".parse().unwrap();
        let ended = "2026-08-05T10:00:02Z".parse().unwrap();
        pin_shape(
            &BenchmarkResult {
                config: ResultConfig {
                    strategy: StrategyKind::Multiplexed,
                    server: "embedded".into(),
                    size_category: SizeCategory::Medium,
                },
                metrics: RunMetrics {
                    duration_ms: 2000,
                    cpu_percent: 12.5,
                    peak_memory_mb: 64,
                    throughput_mbps: 15.0,
                    success_rate: 75.0,
                },
                file_size: 10_485_760,
                started_at: started,
                ended_at: ended,
                error: None,
            },
            json!({
                "config": {
                    "strategy": "multiplexed",
                    "server": "embedded",
                    "sizeCategory": "medium",
                },
                "metrics": {
                    "durationMs": 2000,
                    "cpuPercent": 12.5,
                    "peakMemoryMb": 64,
                    "throughputMbps": 15.0,
                    "successRate": 75.0,
                },
                "fileSize": 10_485_760,
                "startedAt": "2026-08-05T10:00:00Z",
                "endedAt": "2026-08-05T10:00:02Z",
            }),
        );
    }
}

//! Durable status storage: wire models, the gzip document codec, and the
//! compare-and-swap KV seam.

mod models;
pub mod nats;
mod writer;

pub use models::*;
pub use writer::StatusWriter;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::time::Duration;
use thiserror::Error;

/// KV bucket holding one document per endpoint.
pub const BUCKET_NAME: &str = "BEEP_STATUS";

/// Size cap for the bucket.
pub const BUCKET_MAX_BYTES: i64 = 50 * 1024 * 1024;

/// Deadline for individual KV operations.
pub const KV_OP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("kv connection error: {0}")]
    Connection(String),
    #[error("kv read error: {0}")]
    Read(String),
    #[error("kv write error: {0}")]
    Write(String),
    #[error("document codec error: {0}")]
    Codec(String),
}

/// Entry read back from the KV store.
#[derive(Debug, Clone)]
pub struct KvEntry {
    pub value: Vec<u8>,
    pub revision: u64,
}

/// Compare-and-swap key-value seam. `update` succeeds only while `revision`
/// still matches the stored entry; that revision check is the sole
/// cross-process concurrency primitive.
#[async_trait]
pub trait KvBucket: Send + Sync {
    async fn entry(&self, key: &str) -> Result<Option<KvEntry>, StoreError>;
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError>;
    async fn update(&self, key: &str, value: Vec<u8>, revision: u64) -> Result<u64, StoreError>;
}

/// Gzip-compress a document to its stored form.
pub fn encode_document(doc: &StoredDocument) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec(doc).map_err(|e| StoreError::Codec(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    encoder.finish().map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decompress and decode a stored document.
pub fn decode_document(bytes: &[u8]) -> Result<StoredDocument, StoreError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Fetch and decode the latest stored document for one endpoint.
pub async fn read_document(kv: &dyn KvBucket, name: &str) -> Result<StoredDocument, StoreError> {
    let entry = tokio::time::timeout(KV_OP_TIMEOUT, kv.entry(name))
        .await
        .map_err(|_| StoreError::Read("kv get timed out".to_string()))??
        .ok_or_else(|| StoreError::Read(format!("no stored document for key {name}")))?;
    decode_document(&entry.value)
}

#[cfg(test)]
pub(crate) mod testkv;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;

    fn document() -> StoredDocument {
        StoredDocument {
            index: 2,
            payload: StatusPayload {
                probe: ProbeResult {
                    id: "monitor_1".to_string(),
                    name: "svc".to_string(),
                    protocol: "HTTPS".to_string(),
                    state: vec!["up".to_string()],
                    description: "svc - 200".to_string(),
                    date: vec!["01/03/2025".to_string()],
                    timestamp: "12:00:00.000".to_string(),
                },
                sla: SlaReport::default(),
            },
        }
    }

    #[test]
    fn documents_survive_the_gzip_codec() {
        let doc = document();
        let bytes = encode_document(&doc).unwrap();
        // Gzip magic bytes.
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        let decoded = decode_document(&bytes).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_document(b"not gzip at all"),
            Err(StoreError::Codec(_))
        ));
    }

    #[test]
    fn compressed_garbage_fails_to_decode() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"index\": oops").unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(
            decode_document(&bytes),
            Err(StoreError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn read_document_round_trips_through_a_bucket() {
        let kv = testkv::MemoryKv::default();
        let doc = document();
        kv.create("svc", encode_document(&doc).unwrap()).await.unwrap();

        let read = read_document(&kv, "svc").await.unwrap();
        assert_eq!(read, doc);

        assert!(matches!(
            read_document(&kv, "other").await,
            Err(StoreError::Read(_))
        ));
    }
}

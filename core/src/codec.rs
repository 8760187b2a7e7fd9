//! Token record encoding.
//!
//! The store treats the encoded record as opaque bytes. Any codec works as long
//! as it is symmetric: whatever `encode` writes, `decode` reads back unchanged.

use crate::error::{Result, StoreError};
use crate::record::TokenRecord;

/// Symmetric encoder/decoder for token records.
pub trait RecordCodec: Send + Sync {
    /// Encode a record to bytes.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the record cannot be encoded.
    fn encode(&self, record: &TokenRecord) -> Result<Vec<u8>>;

    /// Decode a record from bytes.
    ///
    /// # Errors
    ///
    /// Returns `SerializationFailure` if the bytes are not a valid record.
    fn decode(&self, bytes: &[u8]) -> Result<TokenRecord>;
}

/// JSON codec. Human-readable in the store and tolerant of added fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn encode(&self, record: &TokenRecord) -> Result<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| StoreError::SerializationFailure(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<TokenRecord> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::SerializationFailure(e.to_string()))
    }
}

/// Compact binary codec.
///
/// Field order is part of the format, so records written by one build can only
/// be read by builds with the same `TokenRecord` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl RecordCodec for BincodeCodec {
    fn encode(&self, record: &TokenRecord) -> Result<Vec<u8>> {
        bincode::serialize(record).map_err(|e| StoreError::SerializationFailure(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<TokenRecord> {
        bincode::deserialize(bytes).map_err(|e| StoreError::SerializationFailure(e.to_string()))
    }
}

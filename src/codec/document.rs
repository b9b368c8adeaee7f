use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;
use crate::models::block::Block;

/// Undo the store's transport encoding.
///
/// The contents API wraps base64 at 60 columns, so ASCII whitespace is ignored.
pub fn transport_decode(content: &str) -> Result<Vec<u8>, AppError> {
    let compact: String = content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AppError::MalformedDocument(format!("Invalid base64 payload: {e}")))
}

pub fn transport_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode_json<T: DeserializeOwned>(content: &str) -> Result<T, AppError> {
    let bytes = transport_decode(content)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::MalformedDocument(format!("Invalid JSON document: {e}")))
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::MalformedDocument(format!("Failed to serialize document: {e}")))?;
    Ok(transport_encode(&json))
}

/// Transport-decode then parse the block collection. No partial result on failure.
pub fn decode(content: &str) -> Result<Vec<Block>, AppError> {
    decode_json(content)
}

/// Serialize the block collection (array order preserved) then transport-encode it.
pub fn encode(blocks: &[Block]) -> Result<String, AppError> {
    encode_json(blocks)
}

/// Parse the tag vocabulary document (a JSON array of strings).
pub fn decode_tags(content: &str) -> Result<Vec<String>, AppError> {
    decode_json(content)
}

//! # Cursor Utilities
//!
//! This module provides utilities for encoding and decoding pagination cursors
//! with validation. A cursor is the base64 of `{"id": <last id on the page>}`.

use crate::error::ApiError;
use axum::http::StatusCode;
use base64::Engine;
use serde::{Deserialize, Serialize};

const MAX_CURSOR_LEN: usize = 1000;
const MAX_DECODED_LEN: usize = 500;

/// Keyset position carried inside a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub id: i32,
}

/// Encode a keyset position as an opaque base64 string
pub fn encode_cursor(id: i32) -> String {
    let json = serde_json::json!({ "id": id }).to_string();
    base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
}

/// Decode a keyset position from an opaque base64 string with validation
pub fn decode_cursor(cursor: &str) -> Result<i32, ApiError> {
    // Check cursor length to prevent extremely large inputs
    if cursor.len() > MAX_CURSOR_LEN {
        return Err(invalid("cursor is too long"));
    }

    if cursor.is_empty() {
        return Err(invalid("cursor cannot be empty"));
    }

    if !cursor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(invalid("cursor contains invalid characters"));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| invalid("cursor is not valid base64"))?;

    if decoded.is_empty() {
        return Err(invalid("cursor is empty after decoding"));
    }

    if decoded.len() > MAX_DECODED_LEN {
        return Err(invalid("decoded cursor is too large"));
    }

    let json =
        String::from_utf8(decoded).map_err(|_| invalid("cursor contains invalid UTF-8 data"))?;

    let cursor_data: CursorData = serde_json::from_str(&json)
        .map_err(|_| invalid("cursor contains invalid JSON structure"))?;

    // Storage never assigns ids below 1
    if cursor_data.id < 0 {
        return Err(invalid("cursor contains invalid ID"));
    }

    Ok(cursor_data.id)
}

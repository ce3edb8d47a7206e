//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Handshake codec.
//!
//! Before any hub message flows, the client announces the protocol it wants
//! to speak and the server acknowledges it. Both records use the text framing
//! from [`text`](crate::protocol::text) regardless of the negotiated protocol.
//!
//! # Handshake Flow
//!
//! 1. Client sends `{"protocol":"json","version":1}` + `0x1E`
//! 2. Server replies `{}` + `0x1E` on success, or `{"error":"..."}` + `0x1E`
//! 3. Protocol messages may follow the response in the same chunk
//!
//! # Examples
//!
//! ```rust
//! use bytes::BytesMut;
//! use hubrpc::protocol::handshake::{self, HandshakeRequestMessage};
//!
//! let request = handshake::write_request(&HandshakeRequestMessage::new("json", 1)).unwrap();
//! assert_eq!(&request[..], b"{\"protocol\":\"json\",\"version\":1}\x1e");
//!
//! let mut buffer = BytesMut::from(&b"{}\x1e{\"type\":6}\x1e"[..]);
//! let response = handshake::try_read_response(&mut buffer).unwrap().unwrap();
//! assert!(response.error.is_none());
//! assert_eq!(&buffer[..], b"{\"type\":6}\x1e");
//! ```

use crate::protocol::ProtocolError;
use crate::protocol::text::{RECORD_SEPARATOR, take_record, write_record};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The first record sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequestMessage {
    /// Protocol name, e.g. `json`.
    pub protocol: String,
    /// Protocol version.
    pub version: u32,
}

impl HandshakeRequestMessage {
    /// Creates a handshake request.
    pub fn new(protocol: impl Into<String>, version: u32) -> Self {
        Self {
            protocol: protocol.into(),
            version,
        }
    }
}

/// The server's answer to a [`HandshakeRequestMessage`].
///
/// A response without `error` means the handshake succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandshakeResponseMessage {
    /// Why the server rejected the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Encodes a handshake request with its record separator.
pub fn write_request(request: &HandshakeRequestMessage) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(request).map_err(ProtocolError::encode)?;
    let mut out = BytesMut::with_capacity(payload.len() + 1);
    write_record(&payload, &mut out);
    Ok(out.freeze())
}

/// Encodes a handshake response with its record separator.
///
/// Used by in-memory servers in tests.
pub fn write_response(response: &HandshakeResponseMessage) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(response).map_err(ProtocolError::encode)?;
    let mut out = BytesMut::with_capacity(payload.len() + 1);
    write_record(&payload, &mut out);
    Ok(out.freeze())
}

/// Parses one handshake response record, without its separator.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidHandshakeResponse`] unless `record` is a
/// JSON object whose optional `error` property is a string.
pub fn parse_response(record: &[u8]) -> Result<HandshakeResponseMessage, ProtocolError> {
    let invalid = |reason: String| ProtocolError::InvalidHandshakeResponse { reason };

    let value: Value = serde_json::from_slice(record).map_err(|e| invalid(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(invalid("expected a JSON object".to_string()));
    };

    let error = match object.remove("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(error)) => Some(error),
        Some(_) => return Err(invalid("'error' must be a string".to_string())),
    };

    Ok(HandshakeResponseMessage { error })
}

/// Reads the handshake response from a buffer that must hold the whole record.
///
/// # Errors
///
/// Returns [`ProtocolError::IncompleteMessage`] when no record separator is
/// present, otherwise whatever [`parse_response`] returns.
pub fn read_response(bytes: &[u8]) -> Result<HandshakeResponseMessage, ProtocolError> {
    let end = bytes
        .iter()
        .position(|&byte| byte == RECORD_SEPARATOR)
        .ok_or(ProtocolError::IncompleteMessage)?;
    parse_response(&bytes[..end])
}

/// Pulls the handshake response off the front of a streaming buffer.
///
/// Returns `Ok(None)` while the record is incomplete. On success the record
/// and its separator are removed and any following bytes remain in `buffer`.
pub fn try_read_response(
    buffer: &mut BytesMut,
) -> Result<Option<HandshakeResponseMessage>, ProtocolError> {
    match take_record(buffer) {
        Some(record) => parse_response(&record).map(Some),
        None => Ok(None),
    }
}

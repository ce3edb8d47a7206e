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

//! Wire codec error types.
//!
//! Errors in this module are raised while framing, encoding or decoding hub
//! messages. Argument binding failures are *not* errors at this level: they are
//! reported in-band as [`HubMessage::InvocationBindingFailure`] so that a single
//! bad invocation never tears down the connection.
//!
//! [`HubMessage::InvocationBindingFailure`]: crate::protocol::HubMessage::InvocationBindingFailure

use thiserror::Error;

/// Errors produced by the hub wire codecs and the handshake codec.
///
/// All variants carry owned strings so the error can be cloned and handed to
/// every waiter of a shared start or stop operation.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::ProtocolError;
///
/// let error = ProtocolError::LengthMismatch { actual: 12, claimed: 13 };
/// assert_eq!(
///     error.to_string(),
///     "MessagePack message was length 12 but claimed to be length 13."
/// );
/// assert!(error.is_framing_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A caller asserted that a complete message was buffered but the
    /// terminating record separator or the full binary payload is missing.
    #[error("Message is incomplete.")]
    IncompleteMessage,

    /// The payload is not well-formed JSON or MessagePack.
    #[error("Error reading {format} message: {reason}")]
    Malformed {
        /// Name of the wire format being read.
        format: &'static str,
        /// Parser diagnostic.
        reason: String,
    },

    /// A required property is absent from the message.
    #[error("Missing required property '{property}'.")]
    MissingProperty {
        /// Name of the missing property.
        property: &'static str,
    },

    /// A property is present but has the wrong shape.
    #[error("Expected '{property}' to be of type {expected}.")]
    InvalidProperty {
        /// Name of the offending property.
        property: &'static str,
        /// Description of the expected type.
        expected: &'static str,
    },

    /// A completion carried both a result and an error.
    #[error("Expected either 'error' or 'result' to be provided, but not both.")]
    ConflictingCompletion,

    /// A binary completion used a result kind outside 1..=3.
    #[error("Invalid invocation result kind {0}.")]
    InvalidResultKind(u64),

    /// The message type tag is outside the supported set, or the receiving
    /// side does not handle the variant.
    #[error("The message type {0} is not supported yet.")]
    UnsupportedMessageType(String),

    /// The binary length header disagrees with the bytes consumed by the
    /// MessagePack payload.
    #[error("MessagePack message was length {actual} but claimed to be length {claimed}.")]
    LengthMismatch {
        /// Bytes actually consumed by the payload.
        actual: usize,
        /// Bytes announced by the length header.
        claimed: usize,
    },

    /// The varint length header is longer than five bytes or overflows 31 bits.
    #[error("Messages over 2GB in size are not supported.")]
    LengthHeaderOverflow,

    /// The handshake response could not be parsed.
    #[error("An invalid handshake response was received from the server.")]
    InvalidHandshakeResponse {
        /// Parser diagnostic.
        reason: String,
    },

    /// A message could not be encoded.
    #[error("Failed to write message: {reason}")]
    Encode {
        /// Encoder diagnostic.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns `true` for errors that indicate the byte stream itself is
    /// corrupt, as opposed to a single malformed message.
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            Self::IncompleteMessage | Self::LengthMismatch { .. } | Self::LengthHeaderOverflow
        )
    }

    pub(crate) fn malformed(format: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            format,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(reason: impl std::fmt::Display) -> Self {
        Self::Encode {
            reason: reason.to_string(),
        }
    }
}

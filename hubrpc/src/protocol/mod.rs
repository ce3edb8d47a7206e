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

//! Hub wire protocols.
//!
//! A [`HubProtocol`] turns [`HubMessage`]s into bytes and back. Two protocols
//! ship with the crate:
//!
//! | Protocol | Name | Framing | Transfer format |
//! |----------|------|---------|-----------------|
//! | [`JsonHubProtocol`] | `json` | JSON object + `0x1E` | Text |
//! | `MessagePackHubProtocol` | `messagepack` | varint length + MessagePack array | Binary |
//!
//! The MessagePack protocol requires the `messagepack` feature (enabled by
//! default).
//!
//! The handshake that precedes protocol traffic always uses the text framing,
//! see [`handshake`].
//!
//! # Examples
//!
//! ```rust
//! use bytes::BytesMut;
//! use hubrpc::protocol::{HubMessage, HubProtocol, JsonHubProtocol, NoBinder};
//!
//! let protocol = JsonHubProtocol::new();
//! let bytes = protocol.write_message(&HubMessage::Ping).unwrap();
//! assert_eq!(&bytes[..], b"{\"type\":6}\x1e");
//!
//! let mut buffer = BytesMut::from(&bytes[..]);
//! let messages = protocol.parse_messages(&mut buffer, &NoBinder).unwrap();
//! assert_eq!(messages, vec![HubMessage::Ping]);
//! ```

mod binder;
mod error;
pub mod handshake;
mod json;
mod message;
#[cfg(feature = "messagepack")]
mod messagepack;
pub mod text;
pub mod varint;

pub use binder::{InvocationBinder, NoBinder, ParameterType};
pub(crate) use binder::bind_arguments;
pub use error::ProtocolError;
pub use json::JsonHubProtocol;
pub use message::{
    CancelInvocationMessage, CloseMessage, CompletionMessage, CompletionOutcome, Headers,
    HubMessage, InvocationBindingFailure, InvocationMessage, MessageType, StreamInvocationMessage,
    StreamItemMessage,
};
#[cfg(feature = "messagepack")]
pub use messagepack::MessagePackHubProtocol;

use bytes::{Bytes, BytesMut};
use std::fmt;

/// The framing a transport must preserve for a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFormat {
    /// UTF-8 text frames.
    Text,
    /// Arbitrary binary frames.
    Binary,
}

impl TransferFormat {
    /// The name used in negotiate responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Binary => "Binary",
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hub message codec.
///
/// Implementations are stateless; all buffering lives in the caller-owned
/// `BytesMut` passed to [`parse_messages`](Self::parse_messages).
pub trait HubProtocol: Send + Sync + fmt::Debug {
    /// Protocol name sent in the handshake request.
    fn name(&self) -> &'static str;

    /// Protocol version sent in the handshake request.
    fn version(&self) -> u32;

    /// Framing the transport must preserve.
    fn transfer_format(&self) -> TransferFormat;

    /// Encodes one message, including its framing.
    ///
    /// # Errors
    ///
    /// Fails for [`HubMessage::InvocationBindingFailure`], which has no wire
    /// representation, and when the payload can not be encoded.
    fn write_message(&self, message: &HubMessage) -> Result<Bytes, ProtocolError>;

    /// Decodes every complete message at the front of `buffer`.
    ///
    /// Consumed bytes are removed from `buffer`; a trailing partial message is
    /// left in place for the next call. Arguments of invocations are checked
    /// against `binder` and mismatches are returned as
    /// [`HubMessage::InvocationBindingFailure`].
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when a complete message is malformed.
    fn parse_messages(
        &self,
        buffer: &mut BytesMut,
        binder: &dyn InvocationBinder,
    ) -> Result<Vec<HubMessage>, ProtocolError>;
}

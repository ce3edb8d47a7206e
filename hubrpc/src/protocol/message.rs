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

//! The hub message envelope.
//!
//! [`HubMessage`] is the closed set of messages exchanged once the handshake
//! has completed. Arguments, stream items and results are carried as
//! [`serde_json::Value`] regardless of the wire format; the binary codec
//! converts MessagePack values at the edge.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Application headers attached to a message.
pub type Headers = BTreeMap<String, String>;

/// Numeric tag carried in the `type` field of every message.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::MessageType;
///
/// assert_eq!(MessageType::from_tag(3), Some(MessageType::Completion));
/// assert_eq!(MessageType::Completion.tag(), 3);
/// assert_eq!(MessageType::from_tag(8), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A method invocation, with or without an id.
    Invocation,
    /// One item of a stream.
    StreamItem,
    /// The outcome of an invocation or the end of a stream.
    Completion,
    /// A request to start a server-to-client stream.
    StreamInvocation,
    /// A request to cancel a stream.
    CancelInvocation,
    /// A keep-alive.
    Ping,
    /// A request to close the connection.
    Close,
}

impl MessageType {
    /// Returns the wire tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::Invocation => 1,
            Self::StreamItem => 2,
            Self::Completion => 3,
            Self::StreamInvocation => 4,
            Self::CancelInvocation => 5,
            Self::Ping => 6,
            Self::Close => 7,
        }
    }

    /// Maps a wire tag back to a message type.
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(Self::Invocation),
            2 => Some(Self::StreamItem),
            3 => Some(Self::Completion),
            4 => Some(Self::StreamInvocation),
            5 => Some(Self::CancelInvocation),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invocation => "Invocation",
            Self::StreamItem => "StreamItem",
            Self::Completion => "Completion",
            Self::StreamInvocation => "StreamInvocation",
            Self::CancelInvocation => "CancelInvocation",
            Self::Ping => "Ping",
            Self::Close => "Close",
        };
        f.write_str(name)
    }
}

/// An invocation of a method on the remote peer.
///
/// Without an `invocation_id` the invocation is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationMessage {
    /// Application headers.
    pub headers: Headers,
    /// Correlation id, present when a completion is expected.
    pub invocation_id: Option<String>,
    /// Name of the method to invoke.
    pub target: String,
    /// Positional arguments.
    pub arguments: Vec<Value>,
    /// Ids of the upload streams fed to the method.
    pub stream_ids: Vec<String>,
}

impl InvocationMessage {
    /// Creates an invocation of `target` with the given arguments.
    pub fn new(
        invocation_id: Option<String>,
        target: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id,
            target: target.into(),
            arguments,
            stream_ids: Vec::new(),
        }
    }

    /// Attaches upload stream ids.
    pub fn with_stream_ids(mut self, stream_ids: Vec<String>) -> Self {
        self.stream_ids = stream_ids;
        self
    }
}

/// A request to start a stream from the receiving peer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamInvocationMessage {
    /// Application headers.
    pub headers: Headers,
    /// Correlation id for the stream items and the final completion.
    pub invocation_id: String,
    /// Name of the streaming method.
    pub target: String,
    /// Positional arguments.
    pub arguments: Vec<Value>,
    /// Ids of the upload streams fed to the method.
    pub stream_ids: Vec<String>,
}

impl StreamInvocationMessage {
    /// Creates a stream invocation of `target`.
    pub fn new(
        invocation_id: impl Into<String>,
        target: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            target: target.into(),
            arguments,
            stream_ids: Vec::new(),
        }
    }

    /// Attaches upload stream ids.
    pub fn with_stream_ids(mut self, stream_ids: Vec<String>) -> Self {
        self.stream_ids = stream_ids;
        self
    }
}

/// One item of a stream, in either direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamItemMessage {
    /// Application headers.
    pub headers: Headers,
    /// Id of the stream the item belongs to.
    pub invocation_id: String,
    /// The item payload.
    pub item: Value,
}

impl StreamItemMessage {
    /// Creates a stream item.
    pub fn new(invocation_id: impl Into<String>, item: Value) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            item,
        }
    }
}

/// How an invocation or stream ended.
///
/// A completion carries a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompletionOutcome {
    /// Success without a payload.
    #[default]
    Empty,
    /// Success with a payload. `Value::Null` is a legitimate result.
    Result(Value),
    /// Failure with the peer's message.
    Error(String),
}

/// Completes an invocation or stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionMessage {
    /// Application headers.
    pub headers: Headers,
    /// Id of the invocation being completed.
    pub invocation_id: String,
    /// Outcome of the invocation.
    pub outcome: CompletionOutcome,
}

impl CompletionMessage {
    /// A completion without a payload.
    pub fn empty(invocation_id: impl Into<String>) -> Self {
        Self::new(invocation_id, CompletionOutcome::Empty)
    }

    /// A completion carrying a result.
    pub fn with_result(invocation_id: impl Into<String>, result: Value) -> Self {
        Self::new(invocation_id, CompletionOutcome::Result(result))
    }

    /// A completion carrying an error.
    pub fn with_error(invocation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(invocation_id, CompletionOutcome::Error(error.into()))
    }

    fn new(invocation_id: impl Into<String>, outcome: CompletionOutcome) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            outcome,
        }
    }
}

/// Cancels a stream started with a [`StreamInvocationMessage`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancelInvocationMessage {
    /// Application headers.
    pub headers: Headers,
    /// Id of the stream to cancel.
    pub invocation_id: String,
}

impl CancelInvocationMessage {
    /// Creates a cancellation for `invocation_id`.
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
        }
    }
}

/// Announces that the sender is closing the connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseMessage {
    /// Reason for an abnormal close.
    pub error: Option<String>,
    /// Whether the peer may reconnect.
    pub allow_reconnect: bool,
}

/// An inbound invocation whose arguments did not match the registered
/// handler's parameter types.
///
/// Only the decoder produces this; it can not be written to the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationBindingFailure {
    /// Id of the failed invocation, if it expected a completion.
    pub invocation_id: Option<String>,
    /// Target of the failed invocation.
    pub target: String,
    /// Description of the binding error.
    pub error: String,
}

/// Every message exchanged after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// See [`InvocationMessage`].
    Invocation(InvocationMessage),
    /// See [`StreamItemMessage`].
    StreamItem(StreamItemMessage),
    /// See [`CompletionMessage`].
    Completion(CompletionMessage),
    /// See [`StreamInvocationMessage`].
    StreamInvocation(StreamInvocationMessage),
    /// See [`CancelInvocationMessage`].
    CancelInvocation(CancelInvocationMessage),
    /// Keep-alive.
    Ping,
    /// See [`CloseMessage`].
    Close(CloseMessage),
    /// See [`InvocationBindingFailure`].
    InvocationBindingFailure(InvocationBindingFailure),
}

impl HubMessage {
    /// Returns the wire type, or `None` for the decoder-only binding failure.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Self::Invocation(_) => Some(MessageType::Invocation),
            Self::StreamItem(_) => Some(MessageType::StreamItem),
            Self::Completion(_) => Some(MessageType::Completion),
            Self::StreamInvocation(_) => Some(MessageType::StreamInvocation),
            Self::CancelInvocation(_) => Some(MessageType::CancelInvocation),
            Self::Ping => Some(MessageType::Ping),
            Self::Close(_) => Some(MessageType::Close),
            Self::InvocationBindingFailure(_) => None,
        }
    }

    /// Returns the invocation id the message refers to, if any.
    pub fn invocation_id(&self) -> Option<&str> {
        match self {
            Self::Invocation(m) => m.invocation_id.as_deref(),
            Self::StreamItem(m) => Some(&m.invocation_id),
            Self::Completion(m) => Some(&m.invocation_id),
            Self::StreamInvocation(m) => Some(&m.invocation_id),
            Self::CancelInvocation(m) => Some(&m.invocation_id),
            Self::InvocationBindingFailure(m) => m.invocation_id.as_deref(),
            Self::Ping | Self::Close(_) => None,
        }
    }

    /// A short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invocation(_) => "Invocation",
            Self::StreamItem(_) => "StreamItem",
            Self::Completion(_) => "Completion",
            Self::StreamInvocation(_) => "StreamInvocation",
            Self::CancelInvocation(_) => "CancelInvocation",
            Self::Ping => "Ping",
            Self::Close(_) => "Close",
            Self::InvocationBindingFailure(_) => "InvocationBindingFailure",
        }
    }
}

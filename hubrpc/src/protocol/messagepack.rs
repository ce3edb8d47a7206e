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

//! The binary hub protocol.
//!
//! Each message is a varint length prefix (see [`varint`]) followed by a
//! MessagePack array whose first element is the message type:
//!
//! ```text
//! Invocation       [1, headers, invocationId | nil, target, arguments, streamIds]
//! StreamItem       [2, headers, invocationId, item]
//! Completion       [3, headers, invocationId, kind, result?]   kind: 1=error 2=void 3=result
//! StreamInvocation [4, headers, invocationId, target, arguments, streamIds]
//! CancelInvocation [5, headers, invocationId]
//! Ping             [6]
//! Close            [7, error | nil, allowReconnect]
//! ```
//!
//! Payload values are converted to and from [`serde_json::Value`]. Binary
//! blobs decode as arrays of byte values and extension types as
//! `{"extType": t, "data": [...]}`.
//!
//! [`varint`]: crate::protocol::varint

use crate::protocol::varint::{read_length_prefix, write_length_prefix};
use crate::protocol::{
    CancelInvocationMessage, CloseMessage, CompletionMessage, CompletionOutcome, Headers,
    HubMessage, HubProtocol, InvocationBinder, InvocationBindingFailure, InvocationMessage,
    MessageType, ProtocolError, StreamInvocationMessage, StreamItemMessage, TransferFormat,
    bind_arguments,
};
use bytes::{Buf, Bytes, BytesMut};
use rmpv::Value as Pack;
use serde_json::{Map, Number, Value};
use std::io::{Cursor, ErrorKind};

const FORMAT: &str = "MessagePack";

const RESULT_KIND_ERROR: u64 = 1;
const RESULT_KIND_VOID: u64 = 2;
const RESULT_KIND_NON_VOID: u64 = 3;

/// MessagePack hub protocol, name `messagepack`, version 1.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::{HubMessage, HubProtocol, MessagePackHubProtocol};
///
/// let protocol = MessagePackHubProtocol::new();
/// let bytes = protocol.write_message(&HubMessage::Ping).unwrap();
/// assert_eq!(&bytes[..], &[0x02, 0x91, 0x06]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackHubProtocol;

impl MessagePackHubProtocol {
    /// Creates the MessagePack protocol.
    pub fn new() -> Self {
        Self
    }
}

impl HubProtocol for MessagePackHubProtocol {
    fn name(&self) -> &'static str {
        "messagepack"
    }

    fn version(&self) -> u32 {
        1
    }

    fn transfer_format(&self) -> TransferFormat {
        TransferFormat::Binary
    }

    fn write_message(&self, message: &HubMessage) -> Result<Bytes, ProtocolError> {
        let packed = to_pack(message)?;
        let mut payload = Vec::new();
        rmpv::encode::write_value(&mut payload, &packed).map_err(ProtocolError::encode)?;

        let mut out = BytesMut::with_capacity(payload.len() + 5);
        write_length_prefix(payload.len(), &mut out)?;
        out.extend_from_slice(&payload);
        Ok(out.freeze())
    }

    fn parse_messages(
        &self,
        buffer: &mut BytesMut,
        binder: &dyn InvocationBinder,
    ) -> Result<Vec<HubMessage>, ProtocolError> {
        let mut messages = Vec::new();

        while let Some((length, header)) = read_length_prefix(&buffer[..])? {
            let available = &buffer[header..];
            let mut cursor = Cursor::new(available);

            let packed = match rmpv::decode::read_value(&mut cursor) {
                Ok(packed) => packed,
                Err(e) if is_eof(&e) => {
                    if available.len() < length {
                        break;
                    }
                    return Err(ProtocolError::malformed(FORMAT, e));
                }
                Err(e) => return Err(ProtocolError::malformed(FORMAT, e)),
            };

            let consumed = cursor.position() as usize;
            let message = from_pack(packed, binder)?;

            if consumed != length {
                if !matches!(message, HubMessage::InvocationBindingFailure(_)) {
                    return Err(ProtocolError::LengthMismatch {
                        actual: consumed,
                        claimed: length,
                    });
                }
                if available.len() < length {
                    break;
                }
            }

            buffer.advance(header + length);
            messages.push(message);
        }

        Ok(messages)
    }
}

fn is_eof(error: &rmpv::decode::Error) -> bool {
    match error {
        rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e) => {
            e.kind() == ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

fn pack_headers(headers: &Headers) -> Pack {
    Pack::Map(
        headers
            .iter()
            .map(|(key, value)| (Pack::from(key.as_str()), Pack::from(value.as_str())))
            .collect(),
    )
}

fn pack_strings(values: &[String]) -> Pack {
    Pack::Array(values.iter().map(|value| Pack::from(value.as_str())).collect())
}

fn pack_optional(value: Option<&str>) -> Pack {
    value.map(Pack::from).unwrap_or(Pack::Nil)
}

fn to_pack(message: &HubMessage) -> Result<Pack, ProtocolError> {
    let tag = |kind: MessageType| Pack::from(kind.tag());

    let packed = match message {
        HubMessage::Invocation(m) => vec![
            tag(MessageType::Invocation),
            pack_headers(&m.headers),
            pack_optional(m.invocation_id.as_deref()),
            Pack::from(m.target.as_str()),
            Pack::Array(m.arguments.iter().map(json_to_pack).collect()),
            pack_strings(&m.stream_ids),
        ],
        HubMessage::StreamInvocation(m) => vec![
            tag(MessageType::StreamInvocation),
            pack_headers(&m.headers),
            Pack::from(m.invocation_id.as_str()),
            Pack::from(m.target.as_str()),
            Pack::Array(m.arguments.iter().map(json_to_pack).collect()),
            pack_strings(&m.stream_ids),
        ],
        HubMessage::StreamItem(m) => vec![
            tag(MessageType::StreamItem),
            pack_headers(&m.headers),
            Pack::from(m.invocation_id.as_str()),
            json_to_pack(&m.item),
        ],
        HubMessage::Completion(m) => {
            let mut fields = vec![
                tag(MessageType::Completion),
                pack_headers(&m.headers),
                Pack::from(m.invocation_id.as_str()),
            ];
            match &m.outcome {
                CompletionOutcome::Error(error) => {
                    fields.push(Pack::from(RESULT_KIND_ERROR));
                    fields.push(Pack::from(error.as_str()));
                }
                CompletionOutcome::Empty => fields.push(Pack::from(RESULT_KIND_VOID)),
                CompletionOutcome::Result(result) => {
                    fields.push(Pack::from(RESULT_KIND_NON_VOID));
                    fields.push(json_to_pack(result));
                }
            }
            fields
        }
        HubMessage::CancelInvocation(m) => vec![
            tag(MessageType::CancelInvocation),
            pack_headers(&m.headers),
            Pack::from(m.invocation_id.as_str()),
        ],
        HubMessage::Ping => vec![tag(MessageType::Ping)],
        HubMessage::Close(m) => vec![
            tag(MessageType::Close),
            pack_optional(m.error.as_deref()),
            Pack::Boolean(m.allow_reconnect),
        ],
        HubMessage::InvocationBindingFailure(_) => {
            return Err(ProtocolError::encode(
                "binding failures can not be written to the wire",
            ));
        }
    };

    Ok(Pack::Array(packed))
}

/// Positional reader over the fields of a decoded message array.
struct Fields {
    items: std::vec::IntoIter<Pack>,
}

impl Fields {
    fn next(&mut self, property: &'static str) -> Result<Pack, ProtocolError> {
        self.items
            .next()
            .ok_or(ProtocolError::MissingProperty { property })
    }

    fn string(&mut self, property: &'static str) -> Result<String, ProtocolError> {
        into_string(self.next(property)?).ok_or(ProtocolError::InvalidProperty {
            property,
            expected: "string",
        })
    }

    fn optional_string(&mut self, property: &'static str) -> Result<Option<String>, ProtocolError> {
        match self.next(property)? {
            Pack::Nil => Ok(None),
            other => into_string(other).map(Some).ok_or(ProtocolError::InvalidProperty {
                property,
                expected: "string",
            }),
        }
    }

    fn headers(&mut self) -> Result<Headers, ProtocolError> {
        let invalid = ProtocolError::InvalidProperty {
            property: "headers",
            expected: "map of strings",
        };
        match self.next("headers")? {
            Pack::Nil => Ok(Headers::new()),
            Pack::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| match (into_string(key), into_string(value)) {
                    (Some(key), Some(value)) => Ok((key, value)),
                    _ => Err(invalid.clone()),
                })
                .collect(),
            _ => Err(invalid),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Value>, ProtocolError> {
        match self.next("arguments")? {
            Pack::Array(arguments) => Ok(arguments.into_iter().map(pack_to_json).collect()),
            _ => Err(ProtocolError::InvalidProperty {
                property: "arguments",
                expected: "array",
            }),
        }
    }

    fn stream_ids(&mut self) -> Result<Vec<String>, ProtocolError> {
        let invalid = ProtocolError::InvalidProperty {
            property: "streamIds",
            expected: "array of strings",
        };
        match self.items.next() {
            None | Some(Pack::Nil) => Ok(Vec::new()),
            Some(Pack::Array(ids)) => ids
                .into_iter()
                .map(|id| into_string(id).ok_or_else(|| invalid.clone()))
                .collect(),
            Some(_) => Err(invalid),
        }
    }

    fn unsigned(&mut self, property: &'static str) -> Result<u64, ProtocolError> {
        self.next(property)?
            .as_u64()
            .ok_or(ProtocolError::InvalidProperty {
                property,
                expected: "integer",
            })
    }
}

fn into_string(value: Pack) -> Option<String> {
    match value {
        Pack::String(s) => s.into_str(),
        _ => None,
    }
}

fn from_pack(packed: Pack, binder: &dyn InvocationBinder) -> Result<HubMessage, ProtocolError> {
    let Pack::Array(items) = packed else {
        return Err(ProtocolError::malformed(FORMAT, "expected a message array"));
    };
    let mut fields = Fields {
        items: items.into_iter(),
    };

    let tag = fields.unsigned("type")?;
    let kind = MessageType::from_tag(tag)
        .ok_or_else(|| ProtocolError::UnsupportedMessageType(tag.to_string()))?;

    let message = match kind {
        MessageType::Invocation => {
            let headers = fields.headers()?;
            let invocation_id = fields.optional_string("invocationId")?;
            let target = fields.string("target")?;
            let arguments = fields.arguments()?;
            let stream_ids = fields.stream_ids()?;
            match bind_arguments(binder, &target, &arguments) {
                Ok(()) => HubMessage::Invocation(InvocationMessage {
                    headers,
                    invocation_id,
                    target,
                    arguments,
                    stream_ids,
                }),
                Err(error) => HubMessage::InvocationBindingFailure(InvocationBindingFailure {
                    invocation_id,
                    target,
                    error,
                }),
            }
        }
        MessageType::StreamInvocation => {
            let headers = fields.headers()?;
            let invocation_id = fields.string("invocationId")?;
            let target = fields.string("target")?;
            let arguments = fields.arguments()?;
            let stream_ids = fields.stream_ids()?;
            match bind_arguments(binder, &target, &arguments) {
                Ok(()) => HubMessage::StreamInvocation(StreamInvocationMessage {
                    headers,
                    invocation_id,
                    target,
                    arguments,
                    stream_ids,
                }),
                Err(error) => HubMessage::InvocationBindingFailure(InvocationBindingFailure {
                    invocation_id: Some(invocation_id),
                    target,
                    error,
                }),
            }
        }
        MessageType::StreamItem => HubMessage::StreamItem(StreamItemMessage {
            headers: fields.headers()?,
            invocation_id: fields.string("invocationId")?,
            item: pack_to_json(fields.next("item")?),
        }),
        MessageType::Completion => {
            let headers = fields.headers()?;
            let invocation_id = fields.string("invocationId")?;
            let outcome = match fields.unsigned("resultKind")? {
                RESULT_KIND_ERROR => CompletionOutcome::Error(fields.string("error")?),
                RESULT_KIND_VOID => CompletionOutcome::Empty,
                RESULT_KIND_NON_VOID => {
                    CompletionOutcome::Result(pack_to_json(fields.next("result")?))
                }
                other => return Err(ProtocolError::InvalidResultKind(other)),
            };
            HubMessage::Completion(CompletionMessage {
                headers,
                invocation_id,
                outcome,
            })
        }
        MessageType::CancelInvocation => HubMessage::CancelInvocation(CancelInvocationMessage {
            headers: fields.headers()?,
            invocation_id: fields.string("invocationId")?,
        }),
        MessageType::Ping => HubMessage::Ping,
        MessageType::Close => {
            let error = fields.optional_string("error")?;
            let allow_reconnect = match fields.items.next() {
                None | Some(Pack::Nil) => false,
                Some(Pack::Boolean(allow)) => allow,
                Some(_) => {
                    return Err(ProtocolError::InvalidProperty {
                        property: "allowReconnect",
                        expected: "boolean",
                    });
                }
            };
            HubMessage::Close(CloseMessage {
                error,
                allow_reconnect,
            })
        }
    };

    Ok(message)
}

/// Converts a JSON payload value into MessagePack.
fn json_to_pack(value: &Value) -> Pack {
    match value {
        Value::Null => Pack::Nil,
        Value::Bool(b) => Pack::Boolean(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Pack::from(u)
            } else if let Some(i) = n.as_i64() {
                Pack::from(i)
            } else {
                Pack::F64(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Pack::from(s.as_str()),
        Value::Array(items) => Pack::Array(items.iter().map(json_to_pack).collect()),
        Value::Object(map) => Pack::Map(
            map.iter()
                .map(|(key, value)| (Pack::from(key.as_str()), json_to_pack(value)))
                .collect(),
        ),
    }
}

fn bytes_to_json(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|&b| Value::from(b)).collect())
}

/// Converts a decoded MessagePack value into a JSON payload value.
fn pack_to_json(value: Pack) -> Value {
    match value {
        Pack::Nil => Value::Null,
        Pack::Boolean(b) => Value::Bool(b),
        Pack::Integer(i) => {
            if let Some(u) = i.as_u64() {
                Value::from(u)
            } else if let Some(i) = i.as_i64() {
                Value::from(i)
            } else {
                Value::Null
            }
        }
        Pack::F32(f) => Number::from_f64(f64::from(f)).map_or(Value::Null, Value::Number),
        Pack::F64(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        Pack::String(s) => match s.into_str() {
            Some(s) => Value::String(s),
            None => Value::Null,
        },
        Pack::Binary(bytes) => bytes_to_json(&bytes),
        Pack::Array(items) => Value::Array(items.into_iter().map(pack_to_json).collect()),
        Pack::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Pack::String(s) => s.into_str().unwrap_or_default(),
                    other => other.to_string(),
                };
                map.insert(key, pack_to_json(value));
            }
            Value::Object(map)
        }
        Pack::Ext(kind, data) => {
            let mut map = Map::new();
            map.insert("extType".to_string(), Value::from(kind));
            map.insert("data".to_string(), bytes_to_json(&data));
            Value::Object(map)
        }
    }
}

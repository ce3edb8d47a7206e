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

//! The text hub protocol.
//!
//! Each message is a compact JSON object terminated by the record separator
//! `0x1E`. The numeric `type` property selects the message kind.

use crate::protocol::text::{take_record, write_record};
use crate::protocol::{
    CancelInvocationMessage, CloseMessage, CompletionMessage, CompletionOutcome, Headers,
    HubMessage, HubProtocol, InvocationBinder, InvocationBindingFailure, InvocationMessage,
    MessageType, ProtocolError, StreamInvocationMessage, StreamItemMessage, TransferFormat,
    bind_arguments,
};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use serde_json::{Map, Value};

const FORMAT: &str = "JSON";

/// JSON hub protocol, name `json`, version 1.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::{HubMessage, HubProtocol, InvocationMessage, JsonHubProtocol};
/// use serde_json::json;
///
/// let protocol = JsonHubProtocol::new();
/// let message = HubMessage::Invocation(InvocationMessage::new(
///     None,
///     "test",
///     vec![json!("42")],
/// ));
/// let bytes = protocol.write_message(&message).unwrap();
/// assert_eq!(&bytes[..], b"{\"type\":1,\"target\":\"test\",\"arguments\":[\"42\"]}\x1e");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHubProtocol;

impl JsonHubProtocol {
    /// Creates the JSON protocol.
    pub fn new() -> Self {
        Self
    }
}

impl HubProtocol for JsonHubProtocol {
    fn name(&self) -> &'static str {
        "json"
    }

    fn version(&self) -> u32 {
        1
    }

    fn transfer_format(&self) -> TransferFormat {
        TransferFormat::Text
    }

    fn write_message(&self, message: &HubMessage) -> Result<Bytes, ProtocolError> {
        let payload = match message {
            HubMessage::Invocation(m) => serde_json::to_vec(&InvocationFrame {
                kind: MessageType::Invocation.tag(),
                headers: &m.headers,
                invocation_id: m.invocation_id.as_deref(),
                target: &m.target,
                arguments: &m.arguments,
                stream_ids: &m.stream_ids,
            }),
            HubMessage::StreamInvocation(m) => serde_json::to_vec(&InvocationFrame {
                kind: MessageType::StreamInvocation.tag(),
                headers: &m.headers,
                invocation_id: Some(m.invocation_id.as_str()),
                target: &m.target,
                arguments: &m.arguments,
                stream_ids: &m.stream_ids,
            }),
            HubMessage::StreamItem(m) => serde_json::to_vec(&StreamItemFrame {
                kind: MessageType::StreamItem.tag(),
                headers: &m.headers,
                invocation_id: &m.invocation_id,
                item: &m.item,
            }),
            HubMessage::Completion(m) => {
                let (result, error) = match &m.outcome {
                    CompletionOutcome::Empty => (None, None),
                    CompletionOutcome::Result(value) => (Some(value), None),
                    CompletionOutcome::Error(error) => (None, Some(error.as_str())),
                };
                serde_json::to_vec(&CompletionFrame {
                    kind: MessageType::Completion.tag(),
                    headers: &m.headers,
                    invocation_id: &m.invocation_id,
                    result,
                    error,
                })
            }
            HubMessage::CancelInvocation(m) => serde_json::to_vec(&CancelFrame {
                kind: MessageType::CancelInvocation.tag(),
                headers: &m.headers,
                invocation_id: &m.invocation_id,
            }),
            HubMessage::Ping => serde_json::to_vec(&PingFrame {
                kind: MessageType::Ping.tag(),
            }),
            HubMessage::Close(m) => serde_json::to_vec(&CloseFrame {
                kind: MessageType::Close.tag(),
                error: m.error.as_deref(),
                allow_reconnect: m.allow_reconnect,
            }),
            HubMessage::InvocationBindingFailure(_) => {
                return Err(ProtocolError::encode(
                    "binding failures can not be written to the wire",
                ));
            }
        }
        .map_err(ProtocolError::encode)?;

        let mut out = BytesMut::with_capacity(payload.len() + 1);
        write_record(&payload, &mut out);
        Ok(out.freeze())
    }

    fn parse_messages(
        &self,
        buffer: &mut BytesMut,
        binder: &dyn InvocationBinder,
    ) -> Result<Vec<HubMessage>, ProtocolError> {
        let mut messages = Vec::new();
        while let Some(record) = take_record(buffer) {
            messages.push(parse_record(&record, binder)?);
        }
        Ok(messages)
    }
}

fn is_empty_headers(headers: &&Headers) -> bool {
    headers.is_empty()
}

fn is_empty_ids(ids: &&[String]) -> bool {
    ids.is_empty()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "is_empty_headers")]
    headers: &'a Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation_id: Option<&'a str>,
    target: &'a str,
    arguments: &'a [Value],
    #[serde(skip_serializing_if = "is_empty_ids")]
    stream_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamItemFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "is_empty_headers")]
    headers: &'a Headers,
    invocation_id: &'a str,
    item: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "is_empty_headers")]
    headers: &'a Headers,
    invocation_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "is_empty_headers")]
    headers: &'a Headers,
    invocation_id: &'a str,
}

#[derive(Serialize)]
struct PingFrame {
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CloseFrame<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    allow_reconnect: bool,
}

fn parse_record(record: &[u8], binder: &dyn InvocationBinder) -> Result<HubMessage, ProtocolError> {
    let value: Value =
        serde_json::from_slice(record).map_err(|e| ProtocolError::malformed(FORMAT, e))?;
    let Value::Object(object) = value else {
        return Err(ProtocolError::malformed(FORMAT, "expected a JSON object"));
    };
    let mut fields = Fields { object };

    let tag = fields
        .take("type")
        .ok_or(ProtocolError::MissingProperty { property: "type" })?;
    let tag = tag.as_u64().ok_or(ProtocolError::InvalidProperty {
        property: "type",
        expected: "integer",
    })?;
    let kind = MessageType::from_tag(tag)
        .ok_or_else(|| ProtocolError::UnsupportedMessageType(tag.to_string()))?;

    let message = match kind {
        MessageType::Invocation => {
            let headers = fields.headers()?;
            let invocation_id = fields.optional_string("invocationId")?;
            let target = fields.required_string("target")?;
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
            let invocation_id = fields.required_string("invocationId")?;
            let target = fields.required_string("target")?;
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
            invocation_id: fields.required_string("invocationId")?,
            item: fields
                .take("item")
                .ok_or(ProtocolError::MissingProperty { property: "item" })?,
        }),
        MessageType::Completion => {
            let headers = fields.headers()?;
            let invocation_id = fields.required_string("invocationId")?;
            let result = fields.take("result");
            let error = fields.optional_string("error")?;
            let outcome = match (result, error) {
                (Some(_), Some(_)) => return Err(ProtocolError::ConflictingCompletion),
                (Some(result), None) => CompletionOutcome::Result(result),
                (None, Some(error)) => CompletionOutcome::Error(error),
                (None, None) => CompletionOutcome::Empty,
            };
            HubMessage::Completion(CompletionMessage {
                headers,
                invocation_id,
                outcome,
            })
        }
        MessageType::CancelInvocation => HubMessage::CancelInvocation(CancelInvocationMessage {
            headers: fields.headers()?,
            invocation_id: fields.required_string("invocationId")?,
        }),
        MessageType::Ping => HubMessage::Ping,
        MessageType::Close => HubMessage::Close(CloseMessage {
            error: fields.optional_string("error")?,
            allow_reconnect: fields.optional_bool("allowReconnect")?.unwrap_or(false),
        }),
    };

    Ok(message)
}

/// Property extraction over a decoded JSON object.
struct Fields {
    object: Map<String, Value>,
}

impl Fields {
    fn take(&mut self, property: &str) -> Option<Value> {
        self.object.remove(property)
    }

    fn optional_string(&mut self, property: &'static str) -> Result<Option<String>, ProtocolError> {
        match self.take(property) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(ProtocolError::InvalidProperty {
                property,
                expected: "string",
            }),
        }
    }

    fn required_string(&mut self, property: &'static str) -> Result<String, ProtocolError> {
        self.optional_string(property)?
            .ok_or(ProtocolError::MissingProperty { property })
    }

    fn optional_bool(&mut self, property: &'static str) -> Result<Option<bool>, ProtocolError> {
        match self.take(property) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(ProtocolError::InvalidProperty {
                property,
                expected: "boolean",
            }),
        }
    }

    fn headers(&mut self) -> Result<Headers, ProtocolError> {
        let invalid = ProtocolError::InvalidProperty {
            property: "headers",
            expected: "map of strings",
        };
        match self.take("headers") {
            None | Some(Value::Null) => Ok(Headers::new()),
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(value) => Ok((key, value)),
                    _ => Err(invalid.clone()),
                })
                .collect(),
            Some(_) => Err(invalid),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Value>, ProtocolError> {
        match self.take("arguments") {
            Some(Value::Array(arguments)) => Ok(arguments),
            None => Err(ProtocolError::MissingProperty {
                property: "arguments",
            }),
            Some(_) => Err(ProtocolError::InvalidProperty {
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
        match self.take("streamIds") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(ids)) => ids
                .into_iter()
                .map(|id| match id {
                    Value::String(id) => Ok(id),
                    _ => Err(invalid.clone()),
                })
                .collect(),
            Some(_) => Err(invalid),
        }
    }
}

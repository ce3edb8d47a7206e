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

//! Inbound message routing.
//!
//! One receive task per session buffers transport chunks, reads the handshake
//! response and then decodes messages strictly in arrival order. Decoded
//! messages are routed to the registry or to the handler table; handlers
//! never run on the receive task.

use crate::HubError;
use crate::connection::session::Session;
use crate::protocol::handshake;
use crate::protocol::{CompletionMessage, HubMessage, InvocationMessage, ProtocolError};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "observability")]
use tracing::{debug, error, warn};

/// Completion error sent when an invocation's arguments did not bind.
pub const BINDING_FAILURE_MESSAGE: &str = "Client failed to parse argument(s).";

/// Completion error sent when a result was expected but no handler gave one.
pub const NO_RESULT_MESSAGE: &str = "Client did not provide a result.";

/// Outcome of the handshake, reported once by the receive task.
pub(crate) type HandshakeSender = oneshot::Sender<Result<(), HubError>>;

/// Decodes everything the transport delivers for `session`.
pub(crate) async fn receive_loop(
    session: Arc<Session>,
    mut chunks: mpsc::UnboundedReceiver<Bytes>,
    handshake_sender: HandshakeSender,
) {
    let mut buffer = BytesMut::new();
    let mut handshake_sender = Some(handshake_sender);

    loop {
        let chunk = tokio::select! {
            chunk = chunks.recv() => chunk,
            _ = session.closed() => None,
        };
        let Some(chunk) = chunk else {
            break;
        };

        session.touch_received();
        buffer.extend_from_slice(&chunk);

        if let Some(sender) = handshake_sender.take() {
            match handshake::try_read_response(&mut buffer) {
                Ok(None) => {
                    handshake_sender = Some(sender);
                    continue;
                }
                Ok(Some(response)) => match response.error {
                    Some(error) => {
                        let _ = sender.send(Err(HubError::HandshakeRejected { error }));
                        break;
                    }
                    None => {
                        #[cfg(feature = "observability")]
                        debug!("Handshake accepted");
                        let _ = sender.send(Ok(()));
                    }
                },
                Err(e) => {
                    let _ = sender.send(Err(HubError::Protocol(e)));
                    break;
                }
            }
            if buffer.is_empty() {
                continue;
            }
        }

        let messages = match session
            .protocol()
            .parse_messages(&mut buffer, session.handlers.as_ref())
        {
            Ok(messages) => messages,
            Err(e) => {
                #[cfg(feature = "observability")]
                error!(error = %e, "Failed to decode inbound message");
                session.request_stop(Some(HubError::Protocol(e)));
                break;
            }
        };

        let mut keep_going = true;
        for message in messages {
            if !dispatch(&session, message).await {
                keep_going = false;
                break;
            }
        }
        if !keep_going {
            break;
        }
    }
}

/// Routes one message. Returns `false` when the session must stop reading.
pub(crate) async fn dispatch(session: &Arc<Session>, message: HubMessage) -> bool {
    #[cfg(feature = "observability")]
    debug!(kind = message.kind(), invocation_id = ?message.invocation_id(), "Received message");

    match message {
        HubMessage::Ping => true,
        HubMessage::Close(close) => {
            #[cfg(feature = "observability")]
            debug!(error = ?close.error, "Server closed the connection");
            session.mark_peer_closed();
            session.request_stop(close.error.map(|reason| HubError::ConnectionClosed { reason }));
            false
        }
        HubMessage::Completion(completion) => {
            session
                .registry
                .complete(&completion.invocation_id, completion.outcome);
            true
        }
        HubMessage::StreamItem(item) => {
            session
                .registry
                .next_stream_item(&item.invocation_id, item.item);
            true
        }
        HubMessage::Invocation(invocation) => {
            if invocation.invocation_id.is_some() {
                let session = session.clone();
                tokio::spawn(async move { run_invocation(&session, invocation).await });
            } else {
                session.enqueue_invocation(invocation);
            }
            true
        }
        HubMessage::InvocationBindingFailure(failure) => {
            #[cfg(feature = "observability")]
            warn!(
                method = %failure.target,
                error = %failure.error,
                "Failed to bind invocation arguments"
            );
            if let Some(id) = failure.invocation_id {
                let completion = CompletionMessage::with_error(id, BINDING_FAILURE_MESSAGE);
                send_completion(session, completion).await;
            }
            true
        }
        other @ (HubMessage::StreamInvocation(_) | HubMessage::CancelInvocation(_)) => {
            let unsupported = ProtocolError::UnsupportedMessageType(other.kind().to_string());
            session.request_stop(Some(HubError::Protocol(unsupported)));
            false
        }
    }
}

/// Runs non-blocking invocations for one target in arrival order.
pub(crate) async fn target_worker(
    session: Arc<Session>,
    mut invocations: mpsc::UnboundedReceiver<InvocationMessage>,
) {
    loop {
        let invocation = tokio::select! {
            invocation = invocations.recv() => invocation,
            _ = session.closed() => None,
        };
        let Some(invocation) = invocation else {
            break;
        };
        run_invocation(&session, invocation).await;
    }
}

/// Runs every handler for the invocation's target, in registration order,
/// and answers with a completion when the server expects one.
pub(crate) async fn run_invocation(session: &Arc<Session>, invocation: InvocationMessage) {
    let InvocationMessage {
        invocation_id,
        target,
        arguments,
        ..
    } = invocation;

    let handlers = session.handlers.handlers(&target);
    if handlers.is_empty() {
        #[cfg(feature = "observability")]
        warn!(method = %target, "No handler registered for invocation target");
    }

    let mut result: Option<Result<Value, String>> = None;
    for handler in handlers {
        let future = (handler.callback)(arguments.clone());
        let outcome = match tokio::spawn(future).await {
            Ok(outcome) => outcome.map_err(|e| e.to_string()),
            Err(join_error) => Err(join_error.to_string()),
        };

        if let Err(_reason) = &outcome {
            #[cfg(feature = "observability")]
            error!(method = %target, error = %_reason, "Handler failed");
        }

        if handler.returns_result {
            result = Some(outcome.map(|value| value.unwrap_or(Value::Null)));
        }
    }

    let Some(id) = invocation_id else {
        return;
    };
    let completion = match result {
        Some(Ok(value)) => CompletionMessage::with_result(id, value),
        Some(Err(reason)) => CompletionMessage::with_error(id, reason),
        None => CompletionMessage::with_error(id, NO_RESULT_MESSAGE),
    };
    send_completion(session, completion).await;
}

async fn send_completion(session: &Session, completion: CompletionMessage) {
    if let Err(_error) = session.send_message(&HubMessage::Completion(completion)).await {
        #[cfg(feature = "observability")]
        warn!(error = %_error, "Failed to send completion");
    }
}

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

//! Integration tests for the connection lifecycle.
//!
//! These tests verify:
//! - The handshake request and the transition to `Connected`
//! - Clean stops, concurrent stops and restarts
//! - Server-initiated closes and the closed callbacks
//! - Start failures: rejected handshakes, timeouts, transport errors

mod common;

use common::{closed_events, connection, manual_connection, next_closed};
use hubrpc::protocol::{CloseMessage, CompletionMessage, HubMessage, InvocationMessage};
use hubrpc::transport::{MemoryTransport, TransportError, TransportKind};
use hubrpc::{ConnectionState, HubConnectionBuilder, HubConnectionConfig, HubError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_start_sends_handshake_and_connects() {
    let (connection, mut server) = connection();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    connection.start().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(
        server.handshake_request().await,
        b"{\"protocol\":\"json\",\"version\":1}\x1e".to_vec()
    );
    assert_eq!(server.server.started_url().as_deref(), Some("ws://localhost/hub"));
}

#[tokio::test]
async fn test_start_when_connected_is_a_no_op() {
    let (connection, server) = connection();
    connection.start().await.unwrap();
    connection.start().await.unwrap();
    assert_eq!(server.server.start_count(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_share_one_attempt() {
    let (connection, server) = connection();
    let (first, second) = tokio::join!(connection.start(), connection.start());
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(server.server.start_count(), 1);
}

#[tokio::test]
async fn test_stop_sends_close_and_runs_callbacks() {
    let (connection, mut server) = connection();
    let mut closed = closed_events(&connection);

    connection.start().await.unwrap();
    connection.stop().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(
        server.next_message().await,
        HubMessage::Close(CloseMessage {
            error: None,
            allow_reconnect: false,
        })
    );
    assert!(next_closed(&mut closed).await.is_none());
    assert!(!server.server.is_running());
}

#[tokio::test]
async fn test_stop_when_disconnected_is_a_no_op() {
    let (connection, server) = connection();
    connection.stop().await.unwrap();
    assert_eq!(server.server.stop_count(), 0);
}

#[tokio::test]
async fn test_concurrent_stops_share_one_sequence() {
    let (connection, server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();

    let (first, second) = tokio::join!(connection.stop(), connection.stop());
    assert!(first.is_ok());
    assert!(second.is_ok());

    assert_eq!(server.server.stop_count(), 1);
    assert!(next_closed(&mut closed).await.is_none());
    assert!(closed.try_recv().is_err());
}

#[tokio::test]
async fn test_calls_require_a_connection() {
    let (connection, _server) = connection();

    let err = connection.invoke::<i32>("Add", (1, 2)).await.unwrap_err();
    assert!(matches!(err, HubError::NotActive { method: "invoke" }));

    let err = connection.send("Notify", ()).await.unwrap_err();
    assert!(matches!(err, HubError::NotActive { method: "send" }));

    let err = connection.stream::<i32>("Count", ()).await.unwrap_err();
    assert!(matches!(err, HubError::NotActive { method: "stream" }));
}

#[tokio::test]
async fn test_restart_uses_a_fresh_session() {
    let (connection, mut server) = connection();

    connection.start().await.unwrap();
    connection.send("First", ()).await.unwrap();
    assert!(matches!(server.next_message().await, HubMessage::Invocation(_)));
    connection.stop().await.unwrap();
    assert!(matches!(server.next_message().await, HubMessage::Close(_)));

    connection.start().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(server.server.start_count(), 2);

    let call = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.invoke::<i32>("Echo", (7,)).await })
    };

    // The handshake of the second start precedes the invocation.
    let chunk = tokio::time::timeout(common::WAIT, server.server.next_sent())
        .await
        .unwrap()
        .unwrap();
    assert!(chunk.starts_with(b"{\"protocol\""));

    let HubMessage::Invocation(invocation) = server.next_message().await else {
        panic!("expected an invocation");
    };
    assert_eq!(invocation.invocation_id.as_deref(), Some("1"));
    server.push(&HubMessage::Completion(CompletionMessage::with_result(
        "1",
        serde_json::json!(7),
    )));
    assert_eq!(call.await.unwrap().unwrap(), 7);
}

#[tokio::test]
async fn test_set_base_url_requires_disconnected() {
    let (connection, _server) = connection();
    connection.set_base_url("ws://localhost/other").unwrap();
    assert_eq!(connection.base_url(), "ws://localhost/other");

    connection.start().await.unwrap();
    let err = connection.set_base_url("ws://localhost/third").unwrap_err();
    assert!(matches!(err, HubError::InvalidState { .. }));
    assert_eq!(connection.base_url(), "ws://localhost/other");
}

#[tokio::test]
async fn test_server_close_message_stops_the_connection() {
    let (connection, mut server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();

    server.push(&HubMessage::Close(CloseMessage {
        error: Some("shutting down".into()),
        allow_reconnect: true,
    }));

    let error = next_closed(&mut closed).await;
    assert!(matches!(
        error,
        Some(HubError::ConnectionClosed { ref reason }) if reason == "shutting down"
    ));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    // No close is echoed back to a server that already closed.
    assert!(server.try_message().is_none());
}

#[tokio::test]
async fn test_transport_close_stops_the_connection() {
    let (connection, server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();

    server.server.close(Some("connection reset".into()));

    let error = next_closed(&mut closed).await;
    assert!(matches!(
        error,
        Some(HubError::ConnectionClosed { ref reason }) if reason == "connection reset"
    ));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_pending_invocations_are_canceled_on_stop() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();

    let call = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.invoke::<String>("Slow", ()).await })
    };
    assert!(matches!(server.next_message().await, HubMessage::Invocation(_)));

    connection.stop().await.unwrap();
    assert!(call.await.unwrap().unwrap_err().is_canceled());
}

#[tokio::test]
async fn test_pending_invocations_fail_with_the_close_reason() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();

    let call = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.invoke::<String>("Slow", ()).await })
    };
    assert!(matches!(server.next_message().await, HubMessage::Invocation(_)));

    server.server.close(Some("lost".into()));
    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, HubError::ConnectionClosed { ref reason } if reason == "lost"));
}

#[tokio::test]
async fn test_rejected_handshake_fails_start() {
    let (connection, mut server) = manual_connection(HubConnectionConfig::default());

    let start = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.start().await })
    };
    server.handshake_request().await;
    server.push_raw(b"{\"error\":\"Requested protocol 'json' is not available.\"}\x1e");

    let err = start.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        HubError::HandshakeRejected { ref error } if error == "Requested protocol 'json' is not available."
    ));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!server.server.is_running());
}

#[tokio::test]
async fn test_messages_after_handshake_in_one_chunk() {
    let (connection, mut server) = manual_connection(HubConnectionConfig::default());
    let (sender, mut received) = tokio::sync::mpsc::unbounded_channel();
    connection.on("Notify", move |(text,): (String,)| {
        let sender = sender.clone();
        async move {
            let _ = sender.send(text);
        }
    });

    let start = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.start().await })
    };
    server.handshake_request().await;
    server.push_raw(b"{}\x1e{\"type\":1,\"target\":\"Notify\",\"arguments\":[\"hi\"]}\x1e");

    start.await.unwrap().unwrap();
    let text = tokio::time::timeout(common::WAIT, received.recv()).await.unwrap();
    assert_eq!(text.as_deref(), Some("hi"));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout() {
    let config = HubConnectionConfig::default().with_handshake_timeout(Duration::from_secs(2));
    let (connection, _server) = manual_connection(config);

    let err = connection.start().await.unwrap_err();
    assert!(matches!(err, HubError::HandshakeTimeout));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_transport_start_failure() {
    let (connection, server) = connection();
    server.server.fail_next_start(TransportError::StartFailed {
        url: "ws://localhost/hub".into(),
        reason: "refused".into(),
    });

    let err = connection.start().await.unwrap_err();
    assert!(matches!(err, HubError::Transport(_)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    connection.start().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_stop_while_connecting_cancels_start() {
    let (connection, mut server) = manual_connection(HubConnectionConfig::default());
    let mut closed = closed_events(&connection);

    let start = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.start().await })
    };
    server.handshake_request().await;
    assert_eq!(connection.state(), ConnectionState::Connecting);

    connection.stop().await.unwrap();

    let err = start.await.unwrap().unwrap_err();
    assert!(matches!(err, HubError::ClosedDuringStart));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(next_closed(&mut closed).await.is_none());
}

#[tokio::test]
async fn test_panicking_closed_callback_does_not_block_others() {
    let (connection, _server) = connection();
    connection.on_closed(|_| panic!("callback failure"));
    let mut closed = closed_events(&connection);

    connection.start().await.unwrap();
    connection.stop().await.unwrap();
    assert!(next_closed(&mut closed).await.is_none());
}

#[test]
fn test_skip_negotiation_rejects_other_transports() {
    let (transport, _server) = MemoryTransport::pair();
    let err = HubConnectionBuilder::new("ws://localhost/hub")
        .with_transport(Arc::new(transport))
        .with_transport_kind(TransportKind::ServerSentEvents)
        .with_skip_negotiation(true)
        .build()
        .unwrap_err();
    assert!(matches!(err, HubError::SkipNegotiationUnsupported));
}

#[tokio::test]
async fn test_send_fire_and_forget() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();

    connection.send("Broadcast", ("hello", 3)).await.unwrap();
    assert_eq!(
        server.next_message().await,
        HubMessage::Invocation(InvocationMessage::new(
            None,
            "Broadcast",
            vec![serde_json::json!("hello"), serde_json::json!(3)],
        ))
    );
}

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

//! Integration tests for server-to-client invocations.

mod common;

use common::{WAIT, closed_events, connection, next_closed};
use hubrpc::connection::{BINDING_FAILURE_MESSAGE, HandlerError, NO_RESULT_MESSAGE};
use hubrpc::protocol::{
    CompletionMessage, HubMessage, InvocationMessage, ParameterType, ProtocolError,
    StreamInvocationMessage,
};
use hubrpc::{ConnectionState, HubError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

fn invocation(id: Option<&str>, target: &str, arguments: Vec<serde_json::Value>) -> HubMessage {
    HubMessage::Invocation(InvocationMessage::new(id.map(str::to_string), target, arguments))
}

async fn recv<T>(receiver: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, receiver.recv())
        .await
        .expect("timed out waiting for a handler")
        .expect("handler channel closed")
}

#[tokio::test]
async fn test_handlers_run_in_registration_order() {
    let (connection, server) = connection();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (done, mut finished) = mpsc::unbounded_channel();

    let first = calls.clone();
    connection.on("Notify", move |(text,): (String,)| {
        let first = first.clone();
        async move {
            first.lock().unwrap().push(format!("first:{}", text));
        }
    });
    let second = calls.clone();
    connection.on("Notify", move |(text,): (String,)| {
        let second = second.clone();
        let done = done.clone();
        async move {
            second.lock().unwrap().push(format!("second:{}", text));
            let _ = done.send(());
        }
    });

    connection.start().await.unwrap();
    server.push(&invocation(None, "Notify", vec![json!("hi")]));

    recv(&mut finished).await;
    assert_eq!(*calls.lock().unwrap(), vec!["first:hi", "second:hi"]);
}

#[tokio::test]
async fn test_invocations_for_one_target_run_in_arrival_order() {
    let (connection, server) = connection();
    let (sender, mut received) = mpsc::unbounded_channel();
    connection.on("Tick", move |(n,): (u32,)| {
        let sender = sender.clone();
        async move {
            tokio::task::yield_now().await;
            let _ = sender.send(n);
        }
    });

    connection.start().await.unwrap();
    for n in 0..5 {
        server.push(&invocation(None, "Tick", vec![json!(n)]));
    }

    let mut order = Vec::new();
    for _ in 0..5 {
        order.push(recv(&mut received).await);
    }
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_handler_does_not_delay_other_targets() {
    let (connection, server) = connection();
    let (gate, _) = watch::channel(false);
    let (started_sender, mut started) = mpsc::unbounded_channel();
    let (fast_sender, mut fast) = mpsc::unbounded_channel();

    let waiting = gate.subscribe();
    connection.on("Slow", move |(): ()| {
        let mut waiting = waiting.clone();
        let started = started_sender.clone();
        async move {
            let _ = started.send(());
            let _ = waiting.wait_for(|open| *open).await;
        }
    });
    connection.on("Fast", move |(n,): (u32,)| {
        let sender = fast_sender.clone();
        async move {
            let _ = sender.send(n);
        }
    });

    connection.start().await.unwrap();
    server.push(&invocation(None, "Slow", vec![]));
    recv(&mut started).await;
    server.push(&invocation(None, "Fast", vec![json!(7)]));

    assert_eq!(recv(&mut fast).await, 7);
    assert!(!*gate.borrow());
}

#[tokio::test]
async fn test_unsubscribe_removes_one_handler() {
    let (connection, server) = connection();
    let (first_sender, mut first) = mpsc::unbounded_channel();
    let (second_sender, mut second) = mpsc::unbounded_channel();

    let subscription = connection.on("Notify", move |(): ()| {
        let sender = first_sender.clone();
        async move {
            let _ = sender.send(());
        }
    });
    connection.on("Notify", move |(): ()| {
        let sender = second_sender.clone();
        async move {
            let _ = sender.send(());
        }
    });
    assert_eq!(subscription.target(), "Notify");
    subscription.unsubscribe();

    connection.start().await.unwrap();
    server.push(&invocation(None, "Notify", vec![]));

    recv(&mut second).await;
    assert!(first.try_recv().is_err());
}

#[tokio::test]
async fn test_remove_drops_every_handler_for_a_target() {
    let (connection, mut server) = connection();
    connection.on("Notify", |(): ()| async {});
    connection.remove("Notify");

    connection.start().await.unwrap();
    server.push(&invocation(Some("7"), "Notify", vec![]));

    assert_eq!(
        server.next_message().await,
        HubMessage::Completion(CompletionMessage::with_error("7", NO_RESULT_MESSAGE))
    );
}

#[tokio::test]
async fn test_result_handler_answers_the_server() {
    let (connection, mut server) = connection();
    connection
        .on_with_result("Add", |(a, b): (i64, i64)| async move { Ok::<_, HandlerError>(a + b) })
        .unwrap();

    connection.start().await.unwrap();
    server.push(&invocation(Some("s1"), "Add", vec![json!(2), json!(3)]));

    assert_eq!(
        server.next_message().await,
        HubMessage::Completion(CompletionMessage::with_result("s1", json!(5)))
    );
}

#[tokio::test]
async fn test_result_handler_error_is_reported() {
    let (connection, mut server) = connection();
    connection
        .on_with_result("Fail", |(): ()| async move {
            Err::<i64, HandlerError>("nope".into())
        })
        .unwrap();

    connection.start().await.unwrap();
    server.push(&invocation(Some("s1"), "Fail", vec![]));

    assert_eq!(
        server.next_message().await,
        HubMessage::Completion(CompletionMessage::with_error("s1", "nope"))
    );
}

#[tokio::test]
async fn test_panicking_result_handler_is_reported() {
    let (connection, mut server) = connection();
    connection
        .on_with_result("Crash", |(): ()| async move {
            if true {
                panic!("handler bug");
            }
            Ok::<i64, HandlerError>(0)
        })
        .unwrap();

    connection.start().await.unwrap();
    server.push(&invocation(Some("s1"), "Crash", vec![]));

    let HubMessage::Completion(completion) = server.next_message().await else {
        panic!("expected a completion");
    };
    assert_eq!(completion.invocation_id, "s1");
    assert!(matches!(completion.outcome, hubrpc::protocol::CompletionOutcome::Error(_)));
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_second_result_handler_is_rejected() {
    let (connection, _server) = connection();
    connection
        .on_with_result("Add", |(a,): (i64,)| async move { Ok::<_, HandlerError>(a) })
        .unwrap();

    let err = connection
        .on_with_result("Add", |(a,): (i64,)| async move { Ok::<_, HandlerError>(a) })
        .unwrap_err();
    assert!(matches!(err, HubError::DuplicateResultHandler { ref target } if target == "Add"));
}

#[tokio::test]
async fn test_missing_result_is_reported() {
    let (connection, mut server) = connection();
    connection.on("Notify", |(): ()| async {});

    connection.start().await.unwrap();
    server.push(&invocation(Some("s1"), "Notify", vec![]));

    assert_eq!(
        server.next_message().await,
        HubMessage::Completion(CompletionMessage::with_error("s1", NO_RESULT_MESSAGE))
    );
}

#[tokio::test]
async fn test_binding_failure_is_reported() {
    let (connection, mut server) = connection();
    let (sender, mut called) = mpsc::unbounded_channel();
    connection
        .on_with_result("Add", move |(a, b): (i64, i64)| {
            let sender = sender.clone();
            async move {
                let _ = sender.send(());
                Ok::<_, HandlerError>(a + b)
            }
        })
        .unwrap();

    connection.start().await.unwrap();
    server.push(&invocation(Some("s1"), "Add", vec![json!("x"), json!("y")]));

    assert_eq!(
        server.next_message().await,
        HubMessage::Completion(CompletionMessage::with_error("s1", BINDING_FAILURE_MESSAGE))
    );
    assert!(called.try_recv().is_err());
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_binding_failure_without_id_is_dropped() {
    let (connection, server) = connection();
    let (sender, mut received) = mpsc::unbounded_channel();
    connection.on("Count", move |(n,): (u32,)| {
        let sender = sender.clone();
        async move {
            let _ = sender.send(n);
        }
    });

    connection.start().await.unwrap();
    server.push(&invocation(None, "Count", vec![json!("one")]));
    server.push(&invocation(None, "Count", vec![json!(2)]));

    assert_eq!(recv(&mut received).await, 2);
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_raw_handler_receives_values() {
    let (connection, server) = connection();
    let (sender, mut received) = mpsc::unbounded_channel();
    let parameter_types = vec![ParameterType::any(), ParameterType::of::<Vec<u32>>()];
    connection.on_raw("Raw", parameter_types, move |values| {
        let sender = sender.clone();
        async move {
            let _ = sender.send(values);
        }
    });

    connection.start().await.unwrap();
    server.push(&invocation(None, "Raw", vec![json!({"a": 1}), json!([1, 2])]));

    assert_eq!(recv(&mut received).await, vec![json!({"a": 1}), json!([1, 2])]);
}

#[tokio::test]
async fn test_handlers_survive_restart() {
    let (connection, server) = connection();
    let (sender, mut received) = mpsc::unbounded_channel();
    connection.on("Notify", move |(n,): (u32,)| {
        let sender = sender.clone();
        async move {
            let _ = sender.send(n);
        }
    });

    connection.start().await.unwrap();
    connection.stop().await.unwrap();
    connection.start().await.unwrap();

    server.push(&invocation(None, "Notify", vec![json!(9)]));
    assert_eq!(recv(&mut received).await, 9);
}

#[tokio::test]
async fn test_server_stream_invocation_closes_the_connection() {
    let (connection, server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();

    server.push(&HubMessage::StreamInvocation(StreamInvocationMessage::new(
        "1",
        "Counter",
        vec![],
    )));

    let error = next_closed(&mut closed).await;
    assert!(matches!(
        error,
        Some(HubError::Protocol(ProtocolError::UnsupportedMessageType(ref kind))) if kind == "StreamInvocation"
    ));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_malformed_message_closes_the_connection() {
    let (connection, server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();

    server.push_raw(b"{\"type\":3}\x1e");

    let error = next_closed(&mut closed).await;
    assert!(matches!(error, Some(HubError::Protocol(_))));
}

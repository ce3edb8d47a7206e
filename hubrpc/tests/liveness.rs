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

//! Integration tests for keep-alive pings and the server timeout.
//!
//! All tests run on a paused clock; tokio advances it whenever the runtime
//! is idle, so timers fire without real waiting.

mod common;

use common::{TIMER_WAIT, closed_events, connection, connection_with, next_closed_within};
use hubrpc::protocol::HubMessage;
use hubrpc::{ConnectionState, HubConnectionConfig, HubError};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_ping_after_keep_alive_interval() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();
    let started = Instant::now();

    assert_eq!(server.next_message_within(TIMER_WAIT).await, HubMessage::Ping);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(15), "pinged after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(17), "pinged after {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_outbound_traffic_defers_the_ping() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();
    let started = Instant::now();

    tokio::time::sleep(Duration::from_secs(10)).await;
    connection.send("Heartbeat", ()).await.unwrap();
    assert!(matches!(server.next_message_within(TIMER_WAIT).await, HubMessage::Invocation(_)));

    assert_eq!(server.next_message_within(TIMER_WAIT).await, HubMessage::Ping);
    assert!(started.elapsed() >= Duration::from_secs(25));
}

#[tokio::test(start_paused = true)]
async fn test_server_timeout_closes_the_connection() {
    let (connection, _server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();
    let started = Instant::now();

    let error = next_closed_within(&mut closed, TIMER_WAIT).await;
    assert!(matches!(error, Some(HubError::ServerTimeout)));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_traffic_resets_the_server_timeout() {
    let (connection, server) = connection();
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();
    let started = Instant::now();

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(20)).await;
        server.push(&HubMessage::Ping);
    }
    assert_eq!(connection.state(), ConnectionState::Connected);

    let error = next_closed_within(&mut closed, TIMER_WAIT).await;
    assert!(matches!(error, Some(HubError::ServerTimeout)));
    assert!(started.elapsed() >= Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn test_custom_intervals() {
    let config = HubConnectionConfig::default()
        .with_keep_alive_interval(Duration::from_secs(2))
        .with_server_timeout(Duration::from_secs(5))
        .with_tick_interval(Duration::from_millis(500));
    let (connection, mut server) = connection_with(config);
    let mut closed = closed_events(&connection);
    connection.start().await.unwrap();
    let started = Instant::now();

    assert_eq!(server.next_message_within(TIMER_WAIT).await, HubMessage::Ping);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let error = next_closed_within(&mut closed, TIMER_WAIT).await;
    assert!(matches!(error, Some(HubError::ServerTimeout)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "timed out after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "timed out after {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_timers_stop_with_the_connection() {
    let (connection, mut server) = connection();
    connection.start().await.unwrap();
    connection.stop().await.unwrap();
    assert!(matches!(server.next_message_within(TIMER_WAIT).await, HubMessage::Close(_)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(server.try_message().is_none());
}

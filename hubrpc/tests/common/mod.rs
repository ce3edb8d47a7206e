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

//! Shared fixtures for the integration tests.
//!
//! [`TestServer`] plays the hub on the far side of a [`MemoryTransport`]: it
//! skips the handshake request, decodes everything the client sends with
//! the JSON protocol and pushes encoded messages back.

#![allow(dead_code)]

use bytes::BytesMut;
use hubrpc::protocol::{HubMessage, HubProtocol, JsonHubProtocol, NoBinder};
use hubrpc::transport::{MemoryServer, MemoryTransport, TransportKind};
use hubrpc::{HubConnection, HubConnectionBuilder, HubConnectionConfig, HubError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Upper bound for tests on a paused clock that wait for timers.
pub const TIMER_WAIT: Duration = Duration::from_secs(300);

pub struct TestServer {
    pub server: MemoryServer,
    protocol: JsonHubProtocol,
    buffer: BytesMut,
    pending: VecDeque<HubMessage>,
    handshake_seen: bool,
}

impl TestServer {
    pub fn new(server: MemoryServer) -> Self {
        Self {
            server,
            protocol: JsonHubProtocol::new(),
            buffer: BytesMut::new(),
            pending: VecDeque::new(),
            handshake_seen: false,
        }
    }

    /// Waits for the raw handshake request.
    pub async fn handshake_request(&mut self) -> Vec<u8> {
        assert!(!self.handshake_seen, "handshake already consumed");
        self.handshake_seen = true;
        let chunk = tokio::time::timeout(WAIT, self.server.next_sent())
            .await
            .expect("timed out waiting for the handshake")
            .expect("client went away");
        chunk.to_vec()
    }

    /// Waits for the next message the client sent.
    pub async fn next_message(&mut self) -> HubMessage {
        self.next_message_within(WAIT).await
    }

    /// Waits up to `limit` for the next message the client sent.
    pub async fn next_message_within(&mut self, limit: Duration) -> HubMessage {
        tokio::time::timeout(limit, self.read_message())
            .await
            .expect("timed out waiting for a message")
    }

    async fn read_message(&mut self) -> HubMessage {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return message;
            }
            let chunk = self.server.next_sent().await.expect("client went away");
            if !self.handshake_seen {
                self.handshake_seen = true;
                continue;
            }
            self.buffer.extend_from_slice(&chunk);
            let messages = self
                .protocol
                .parse_messages(&mut self.buffer, &NoBinder)
                .expect("client sent a malformed message");
            self.pending.extend(messages);
        }
    }

    /// Returns a message if one is already queued.
    pub fn try_message(&mut self) -> Option<HubMessage> {
        while let Some(chunk) = self.server.try_next_sent() {
            if !self.handshake_seen {
                self.handshake_seen = true;
                continue;
            }
            self.buffer.extend_from_slice(&chunk);
            let messages = self
                .protocol
                .parse_messages(&mut self.buffer, &NoBinder)
                .expect("client sent a malformed message");
            self.pending.extend(messages);
        }
        self.pending.pop_front()
    }

    /// Encodes and pushes `message` to the client.
    pub fn push(&self, message: &HubMessage) {
        let bytes = self.protocol.write_message(message).expect("encodable message");
        assert!(self.server.push(bytes), "transport is not running");
    }

    /// Pushes raw bytes to the client.
    pub fn push_raw(&self, bytes: &'static [u8]) {
        assert!(self.server.push(bytes), "transport is not running");
    }
}

/// A WebSockets connection that skips negotiation, over a memory transport
/// that acknowledges the handshake.
pub fn connection() -> (HubConnection, TestServer) {
    connection_with(HubConnectionConfig::default())
}

pub fn connection_with(config: HubConnectionConfig) -> (HubConnection, TestServer) {
    build(config, MemoryTransport::pair())
}

/// Like [`connection`], but the test answers the handshake itself.
pub fn manual_connection(config: HubConnectionConfig) -> (HubConnection, TestServer) {
    build(config, MemoryTransport::pair_manual())
}

fn build(
    config: HubConnectionConfig,
    (transport, server): (MemoryTransport, MemoryServer),
) -> (HubConnection, TestServer) {
    let connection = HubConnectionBuilder::new("ws://localhost/hub")
        .with_config(
            config
                .with_transport(TransportKind::WebSockets)
                .with_skip_negotiation(true),
        )
        .with_transport(Arc::new(transport))
        .build()
        .expect("valid connection");
    (connection, TestServer::new(server))
}

/// Routes closed-callback invocations into a channel.
pub fn closed_events(connection: &HubConnection) -> mpsc::UnboundedReceiver<Option<HubError>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    connection.on_closed(move |error| {
        let _ = sender.send(error);
    });
    receiver
}

/// Waits for the next closed-callback invocation.
pub async fn next_closed(
    events: &mut mpsc::UnboundedReceiver<Option<HubError>>,
) -> Option<HubError> {
    next_closed_within(events, WAIT).await
}

/// Waits up to `limit` for the next closed-callback invocation.
pub async fn next_closed_within(
    events: &mut mpsc::UnboundedReceiver<Option<HubError>>,
    limit: Duration,
) -> Option<HubError> {
    tokio::time::timeout(limit, events.recv())
        .await
        .expect("timed out waiting for the closed callback")
        .expect("closed callback sender dropped")
}

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

//! In-memory transport implementation for testing.
//!
//! [`MemoryTransport::pair`] returns a client-side [`Transport`] and the
//! [`MemoryServer`] that scripts the other end. Everything the client sends
//! is queued for the server to inspect, and the server pushes bytes or closes
//! the connection at will.
//!
//! By default the server answers the first chunk it receives, which is the
//! handshake request, with a successful handshake response. Use
//! [`MemoryTransport::pair_manual`] to script the handshake as well.

use crate::protocol::TransferFormat;
use crate::protocol::handshake::{HandshakeResponseMessage, write_response};
use crate::transport::{
    CloseCallback, ReceiveCallback, Transport, TransportError, TransportId,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::{debug, info};

/// Global counter for generating unique transport IDs.
static NEXT_MEMORY_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct MemoryState {
    on_receive: Option<ReceiveCallback>,
    on_close: Option<CloseCallback>,
    running: bool,
    started_url: Option<String>,
    format: Option<TransferFormat>,
    handshake_answered: bool,
    start_failure: Option<TransportError>,
    start_count: usize,
    stop_count: usize,
}

struct Shared {
    id: TransportId,
    auto_handshake: bool,
    state: Mutex<MemoryState>,
    sent: mpsc::UnboundedSender<Bytes>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, data: Bytes) -> bool {
        let callback = {
            let state = self.state();
            if !state.running {
                return false;
            }
            state.on_receive.clone()
        };
        match callback {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }

    fn close(&self, reason: Option<String>) {
        let callback = {
            let mut state = self.state();
            if !state.running {
                return;
            }
            state.running = false;
            state.on_close.clone()
        };
        if let Some(callback) = callback {
            callback(reason);
        }
    }
}

/// Client side of an in-memory transport.
///
/// # Examples
///
/// ```rust
/// use bytes::Bytes;
/// use hubrpc::protocol::TransferFormat;
/// use hubrpc::transport::{MemoryTransport, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (transport, mut server) = MemoryTransport::pair_manual();
/// transport.start("memory://hub", TransferFormat::Text).await?;
/// transport.send(Bytes::from_static(b"hello")).await?;
///
/// assert_eq!(server.next_sent().await.unwrap(), Bytes::from_static(b"hello"));
/// assert_eq!(server.started_url().as_deref(), Some("memory://hub"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Creates a transport whose server acknowledges the handshake.
    pub fn pair() -> (Self, MemoryServer) {
        Self::build(true)
    }

    /// Creates a transport whose server leaves the handshake to the test.
    pub fn pair_manual() -> (Self, MemoryServer) {
        Self::build(false)
    }

    fn build(auto_handshake: bool) -> (Self, MemoryServer) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let id = TransportId::new(NEXT_MEMORY_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed));

        #[cfg(feature = "observability")]
        info!(transport_id = %id, auto_handshake, "Created memory transport pair");

        let shared = Arc::new(Shared {
            id,
            auto_handshake,
            state: Mutex::new(MemoryState::default()),
            sent: sent_tx,
        });

        (
            Self {
                shared: shared.clone(),
            },
            MemoryServer {
                shared,
                sent: sent_rx,
            },
        )
    }

    /// Returns this transport's identifier.
    pub fn id(&self) -> TransportId {
        self.shared.id
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn start(&self, url: &str, format: TransferFormat) -> Result<(), TransportError> {
        let mut state = self.shared.state();
        state.start_count += 1;
        if let Some(error) = state.start_failure.take() {
            return Err(error);
        }
        state.running = true;
        state.handshake_answered = false;
        state.started_url = Some(url.to_string());
        state.format = Some(format);

        #[cfg(feature = "observability")]
        debug!(transport_id = %self.shared.id, url, "Memory transport started");

        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        let answer_handshake = {
            let mut state = self.shared.state();
            if !state.running {
                return Err(TransportError::NotStarted);
            }
            let answer = self.shared.auto_handshake && !state.handshake_answered;
            state.handshake_answered = true;
            answer
        };

        self.shared
            .sent
            .send(data)
            .map_err(|_| TransportError::Closed)?;

        if answer_handshake {
            let response = write_response(&HandshakeResponseMessage::default()).map_err(|e| {
                TransportError::SendFailed {
                    reason: e.to_string(),
                }
            })?;
            self.shared.deliver(response);
        }

        Ok(())
    }

    fn set_on_receive(&self, callback: ReceiveCallback) {
        self.shared.state().on_receive = Some(callback);
    }

    fn set_on_close(&self, callback: CloseCallback) {
        self.shared.state().on_close = Some(callback);
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.shared.state().stop_count += 1;

        #[cfg(feature = "observability")]
        debug!(transport_id = %self.shared.id, "Memory transport stopped");

        self.shared.close(None);
        Ok(())
    }
}

/// Server side of an in-memory transport.
pub struct MemoryServer {
    shared: Arc<Shared>,
    sent: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryServer {
    /// Waits for the next chunk the client sent.
    pub async fn next_sent(&mut self) -> Option<Bytes> {
        self.sent.recv().await
    }

    /// Returns the next chunk the client sent, if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<Bytes> {
        self.sent.try_recv().ok()
    }

    /// Pushes bytes to the client. Returns `false` when the transport is not
    /// running.
    pub fn push(&self, data: impl Into<Bytes>) -> bool {
        self.shared.deliver(data.into())
    }

    /// Closes the connection from the server side.
    pub fn close(&self, error: Option<String>) {
        #[cfg(feature = "observability")]
        debug!(transport_id = %self.shared.id, ?error, "Memory server closing");

        self.shared.close(error);
    }

    /// Makes the next `start` fail with `error`.
    pub fn fail_next_start(&self, error: TransportError) {
        self.shared.state().start_failure = Some(error);
    }

    /// The URL passed to the most recent `start`.
    pub fn started_url(&self) -> Option<String> {
        self.shared.state().started_url.clone()
    }

    /// The transfer format passed to the most recent `start`.
    pub fn transfer_format(&self) -> Option<TransferFormat> {
        self.shared.state().format
    }

    /// Returns `true` between a successful `start` and the next close.
    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    /// Number of `start` calls.
    pub fn start_count(&self) -> usize {
        self.shared.state().start_count
    }

    /// Number of `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.shared.state().stop_count
    }
}

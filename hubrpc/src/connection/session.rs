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

//! Per-start session state.
//!
//! Every successful or attempted `start` gets a fresh [`Session`]: its own
//! registry, id counter, upload streams, handler workers and liveness
//! timestamps. Nothing in here survives a stop, which keeps restarts clean.

use crate::HubError;
use crate::connection::handlers::HandlerTable;
use crate::connection::hub_connection::ConnectionInner;
use crate::connection::id::InvocationIdGenerator;
use crate::connection::registry::InvocationRegistry;
use crate::connection::upload::UploadTracker;
use crate::protocol::{CancelInvocationMessage, HubMessage, HubProtocol, InvocationMessage};
use crate::transport::{Transport, TransportError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

#[cfg(feature = "observability")]
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Session {
    connection: Weak<ConnectionInner>,
    protocol: Arc<dyn HubProtocol>,
    pub(crate) handlers: Arc<HandlerTable>,
    pub(crate) registry: InvocationRegistry,
    pub(crate) ids: InvocationIdGenerator,
    pub(crate) uploads: UploadTracker,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    shutdown: watch::Sender<bool>,
    stop_error: Mutex<Option<HubError>>,
    peer_closed: AtomicBool,
    last_sent: Mutex<Instant>,
    last_received: Mutex<Instant>,
    send_lock: tokio::sync::Mutex<()>,
    workers: Mutex<HashMap<String, mpsc::UnboundedSender<InvocationMessage>>>,
}

impl Session {
    pub(crate) fn new(
        connection: Weak<ConnectionInner>,
        protocol: Arc<dyn HubProtocol>,
        handlers: Arc<HandlerTable>,
    ) -> Self {
        let now = Instant::now();
        Self {
            connection,
            protocol,
            handlers,
            registry: InvocationRegistry::new(),
            ids: InvocationIdGenerator::new(),
            uploads: UploadTracker::default(),
            transport: Mutex::new(None),
            shutdown: watch::Sender::new(false),
            stop_error: Mutex::new(None),
            peer_closed: AtomicBool::new(false),
            last_sent: Mutex::new(now),
            last_received: Mutex::new(now),
            send_lock: tokio::sync::Mutex::new(()),
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn protocol(&self) -> &Arc<dyn HubProtocol> {
        &self.protocol
    }

    pub(crate) fn transport(&self) -> Option<Arc<dyn Transport>> {
        lock(&self.transport).clone()
    }

    /// Binds the transport unless the session was already shut down.
    pub(crate) fn set_transport(&self, transport: Arc<dyn Transport>) -> bool {
        let mut slot = lock(&self.transport);
        if *self.shutdown.borrow() {
            return false;
        }
        *slot = Some(transport);
        true
    }

    /// Signals shutdown. Returns `true` for the first call.
    pub(crate) fn signal_shutdown(&self) -> bool {
        let _slot = lock(&self.transport);
        !self.shutdown.send_replace(true)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been signaled.
    pub(crate) async fn closed(&self) {
        let mut receiver = self.shutdown.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Records why the session ends. The first error wins.
    pub(crate) fn record_error(&self, error: HubError) {
        let mut slot = lock(&self.stop_error);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(crate) fn stop_error(&self) -> Option<HubError> {
        lock(&self.stop_error).clone()
    }

    /// Notes that the server or transport ended the session, so no `Close`
    /// is sent on the way out.
    pub(crate) fn mark_peer_closed(&self) {
        self.peer_closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn peer_closed(&self) -> bool {
        self.peer_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn touch_received(&self) {
        *lock(&self.last_received) = Instant::now();
    }

    pub(crate) fn touch_sent(&self) {
        *lock(&self.last_sent) = Instant::now();
    }

    pub(crate) fn last_received(&self) -> Instant {
        *lock(&self.last_received)
    }

    pub(crate) fn last_sent(&self) -> Instant {
        *lock(&self.last_sent)
    }

    /// Asks the owning connection to stop this session.
    pub(crate) fn request_stop(self: &Arc<Self>, error: Option<HubError>) {
        if let Some(connection) = self.connection.upgrade() {
            connection.stop_session(self, error);
        }
    }

    /// Encodes and sends one message.
    pub(crate) async fn send_message(&self, message: &HubMessage) -> Result<(), HubError> {
        let bytes = self.protocol.write_message(message)?;

        #[cfg(feature = "observability")]
        debug!(kind = message.kind(), invocation_id = ?message.invocation_id(), "Sending message");

        self.send_raw(bytes).await
    }

    /// Sends pre-framed bytes, serialized with every other send.
    pub(crate) async fn send_raw(&self, bytes: Bytes) -> Result<(), HubError> {
        let transport = self
            .transport()
            .ok_or(HubError::Transport(TransportError::NotStarted))?;
        let _guard = self.send_lock.lock().await;
        transport.send(bytes).await?;
        self.touch_sent();
        Ok(())
    }

    /// Sends a best-effort `CancelInvocation` for a stream nobody reads.
    pub(crate) fn spawn_cancel(self: &Arc<Self>, invocation_id: String) {
        if self.is_shut_down() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = self.clone();
        runtime.spawn(async move {
            let cancel = HubMessage::CancelInvocation(CancelInvocationMessage::new(invocation_id));
            if let Err(_error) = session.send_message(&cancel).await {
                #[cfg(feature = "observability")]
                debug!(error = %_error, "Failed to send stream cancellation");
            }
        });
    }

    /// Queues a non-blocking invocation on its target's worker, starting the
    /// worker if needed.
    pub(crate) fn enqueue_invocation(self: &Arc<Self>, mut invocation: InvocationMessage) {
        let mut workers = lock(&self.workers);
        if let Some(worker) = workers.get(&invocation.target) {
            match worker.send(invocation) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => invocation = returned,
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let target = invocation.target.clone();
        let _ = sender.send(invocation);
        workers.insert(target, sender);
        tokio::spawn(crate::connection::dispatch::target_worker(self.clone(), receiver));
    }

    pub(crate) fn clear_workers(&self) {
        lock(&self.workers).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonHubProtocol;
    use crate::transport::MemoryTransport;

    fn session() -> Session {
        Session::new(
            Weak::new(),
            Arc::new(JsonHubProtocol::new()),
            Arc::new(HandlerTable::default()),
        )
    }

    #[test]
    fn test_first_error_wins() {
        let session = session();
        session.record_error(HubError::ServerTimeout);
        session.record_error(HubError::Canceled);
        assert!(matches!(session.stop_error(), Some(HubError::ServerTimeout)));
    }

    #[test]
    fn test_transport_refused_after_shutdown() {
        let session = session();
        assert!(session.signal_shutdown());
        assert!(!session.signal_shutdown());

        let (transport, _server) = MemoryTransport::pair();
        assert!(!session.set_transport(Arc::new(transport)));
        assert!(session.transport().is_none());
    }

    #[tokio::test]
    async fn test_closed_resolves_after_shutdown() {
        let session = Arc::new(session());
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.closed().await })
        };
        session.signal_shutdown();
        waiter.await.unwrap();
        session.closed().await;
    }

    #[tokio::test]
    async fn test_send_without_transport_fails() {
        let session = session();
        let err = session.send_message(&HubMessage::Ping).await.unwrap_err();
        assert!(matches!(err, HubError::Transport(TransportError::NotStarted)));
    }
}

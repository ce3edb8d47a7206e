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

//! The hub connection engine.

use crate::HubError;
use crate::auth::{SharedAccessTokenProvider, StaticAccessToken};
use crate::connection::dispatch::receive_loop;
use crate::connection::handlers::{HandlerCallback, HandlerError, HandlerTable, HubArguments};
use crate::connection::liveness::{self, LivenessSettings};
use crate::connection::session::Session;
use crate::connection::{Arguments, ConnectionState, HubConnectionConfig, HubStream, Subscription};
use crate::negotiate::{
    NegotiationClient, ResolvedEndpoint, USER_AGENT_HEADER, skip_negotiation, user_agent,
};
use crate::protocol::handshake::{self, HandshakeRequestMessage};
use crate::protocol::{
    CloseMessage, HubMessage, HubProtocol, InvocationMessage, ParameterType,
    StreamInvocationMessage,
};
use crate::transport::{Transport, TransportContext, TransportFactory, TransportKind};
use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "observability")]
use tracing::{debug, error, info, warn};

/// Callback run when the connection closes, with the error that closed it.
pub type ClosedCallback = Arc<dyn Fn(Option<HubError>) + Send + Sync>;

type SharedTask = Shared<BoxFuture<'static, Result<(), HubError>>>;

/// Where transports come from.
#[derive(Clone)]
pub(crate) enum TransportSource {
    Factory(Arc<dyn TransportFactory>),
    Fixed(Arc<dyn Transport>),
}

struct Lifecycle {
    state: ConnectionState,
    base_url: String,
    session: Option<Arc<Session>>,
    start_task: Option<SharedTask>,
    stop_task: Option<SharedTask>,
    connection_id: Option<String>,
}

impl Lifecycle {
    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.session = None;
        self.start_task = None;
        self.stop_task = None;
        self.connection_id = None;
    }
}

pub(crate) struct ConnectionInner {
    config: HubConnectionConfig,
    protocol: Arc<dyn HubProtocol>,
    negotiator: Option<NegotiationClient>,
    transports: TransportSource,
    token_provider: Option<SharedAccessTokenProvider>,
    handlers: Arc<HandlerTable>,
    closed_callbacks: Mutex<Vec<ClosedCallback>>,
    lifecycle: Mutex<Lifecycle>,
}

/// Runs `future` on its own task so it completes even if every waiter goes
/// away, and lets any number of waiters share its result.
fn spawn_shared<F>(future: F) -> SharedTask
where
    F: Future<Output = Result<(), HubError>> + Send + 'static,
{
    let handle = tokio::spawn(future);
    async move {
        handle.await.unwrap_or_else(|e| {
            Err(HubError::invalid_state(format!("connection task failed: {}", e)))
        })
    }
    .boxed()
    .shared()
}

impl ConnectionInner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport_context(&self, endpoint: &ResolvedEndpoint) -> TransportContext {
        let mut headers = self.config.headers.clone();
        headers.insert(USER_AGENT_HEADER.to_string(), user_agent());

        let access_token_provider = match &endpoint.access_token {
            Some(token) => {
                Some(Arc::new(StaticAccessToken::new(token.as_str())) as SharedAccessTokenProvider)
            }
            None => self.token_provider.clone(),
        };

        TransportContext {
            headers,
            access_token_provider,
        }
    }

    async fn resolve_endpoint(&self, base_url: &str) -> Result<ResolvedEndpoint, HubError> {
        if self.config.skip_negotiation {
            return skip_negotiation(base_url, self.config.transport_preference);
        }
        let negotiator = self.negotiator.as_ref().ok_or_else(|| HubError::Configuration {
            reason: "an HTTP client is required for negotiation".to_string(),
        })?;
        negotiator
            .negotiate(
                base_url,
                self.token_provider.clone(),
                self.config.transport_preference,
                self.protocol.transfer_format(),
            )
            .await
    }

    /// Negotiates, binds and starts the transport, and completes the
    /// handshake.
    async fn connect(
        self: &Arc<Self>,
        session: &Arc<Session>,
        base_url: &str,
    ) -> Result<ResolvedEndpoint, HubError> {
        let endpoint = self.resolve_endpoint(base_url).await?;

        let transport = match &self.transports {
            TransportSource::Fixed(transport) => transport.clone(),
            TransportSource::Factory(factory) => {
                factory.create(endpoint.transport, self.transport_context(&endpoint))?
            }
        };
        if !session.set_transport(transport.clone()) {
            return Err(HubError::ClosedDuringStart);
        }

        let (chunk_sender, chunks) = mpsc::unbounded_channel::<Bytes>();
        transport.set_on_receive(Arc::new(move |data: Bytes| {
            let _ = chunk_sender.send(data);
        }));
        let connection = Arc::downgrade(self);
        let closed_session = Arc::downgrade(session);
        transport.set_on_close(Arc::new(move |reason: Option<String>| {
            if let (Some(connection), Some(session)) =
                (connection.upgrade(), closed_session.upgrade())
            {
                connection.transport_closed(&session, reason);
            }
        }));

        let (handshake_sender, handshake_receiver) = oneshot::channel();
        tokio::spawn(receive_loop(session.clone(), chunks, handshake_sender));

        #[cfg(feature = "observability")]
        debug!(transport = %endpoint.transport, url = %endpoint.url, "Starting transport");

        transport
            .start(&endpoint.url, self.protocol.transfer_format())
            .await?;

        let request = handshake::write_request(&HandshakeRequestMessage::new(
            self.protocol.name(),
            self.protocol.version(),
        ))?;
        session.send_raw(request).await?;

        match tokio::time::timeout(self.config.handshake_timeout, handshake_receiver).await {
            Err(_) => Err(HubError::HandshakeTimeout),
            Ok(Err(_)) => Err(session.stop_error().unwrap_or(HubError::ClosedDuringStart)),
            Ok(Ok(result)) => result.map(|()| endpoint),
        }
    }

    async fn run_start(
        self: Arc<Self>,
        session: Arc<Session>,
        base_url: String,
    ) -> Result<(), HubError> {
        let connected = tokio::select! {
            result = self.connect(&session, &base_url) => result,
            _ = session.closed() => {
                Err(session.stop_error().unwrap_or(HubError::ClosedDuringStart))
            }
        };

        let error = match connected {
            Ok(endpoint) => {
                let mut lifecycle = self.lifecycle();
                let current = lifecycle.state == ConnectionState::Connecting
                    && lifecycle.is_current(&session);
                if current && !session.is_shut_down() {
                    lifecycle.state = ConnectionState::Connected;
                    lifecycle.start_task = None;
                    lifecycle.connection_id = endpoint.connection_id.clone();
                    drop(lifecycle);

                    session.touch_received();
                    session.touch_sent();
                    if endpoint.transport != TransportKind::LongPolling {
                        liveness::spawn(
                            session.clone(),
                            LivenessSettings::from_config(&self.config),
                        );
                    }

                    #[cfg(feature = "observability")]
                    info!(
                        transport = %endpoint.transport,
                        connection_id = ?endpoint.connection_id,
                        "Connected"
                    );

                    return Ok(());
                }
                session.stop_error().unwrap_or(HubError::ClosedDuringStart)
            }
            Err(error) => error,
        };

        #[cfg(feature = "observability")]
        warn!(%error, "Failed to start connection");

        let owns_cleanup = {
            let mut lifecycle = self.lifecycle();
            let owns =
                lifecycle.state == ConnectionState::Connecting && lifecycle.is_current(&session);
            if owns {
                lifecycle.reset();
            }
            owns
        };
        if owns_cleanup {
            session.signal_shutdown();
            if let Some(transport) = session.transport() {
                let _ = transport.stop().await;
            }
            session.registry.cancel_all(error.clone());
            session.uploads.detach_all();
            session.clear_workers();
        }

        Err(error)
    }

    /// Moves to `Disconnecting` and spawns the stop sequence.
    fn begin_stop(
        self: &Arc<Self>,
        lifecycle: &mut Lifecycle,
        session: Arc<Session>,
        error: Option<HubError>,
    ) -> SharedTask {
        let was_connected = lifecycle.state == ConnectionState::Connected;
        if let Some(error) = error {
            session.record_error(error);
        }

        #[cfg(feature = "observability")]
        debug!(from = %lifecycle.state, "Stopping connection");

        lifecycle.state = ConnectionState::Disconnecting;
        let task = spawn_shared(Self::run_stop(self.clone(), session, was_connected));
        lifecycle.stop_task = Some(task.clone());
        task
    }

    async fn run_stop(
        self: Arc<Self>,
        session: Arc<Session>,
        was_connected: bool,
    ) -> Result<(), HubError> {
        if was_connected && session.stop_error().is_none() && !session.peer_closed() {
            let close = HubMessage::Close(CloseMessage {
                error: None,
                allow_reconnect: false,
            });
            if let Err(_error) = session.send_message(&close).await {
                #[cfg(feature = "observability")]
                debug!(error = %_error, "Failed to send close message");
            }
        }

        session.signal_shutdown();

        let stopped = match session.transport() {
            Some(transport) => transport.stop().await.map_err(HubError::from),
            None => Ok(()),
        };

        let stop_error = session.stop_error();
        session
            .registry
            .cancel_all(stop_error.clone().unwrap_or(HubError::Canceled));
        session.uploads.detach_all();
        session.clear_workers();

        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.is_current(&session) {
                lifecycle.reset();
            }
        }

        #[cfg(feature = "observability")]
        info!(error = ?stop_error, "Disconnected");

        self.run_closed_callbacks(stop_error.or_else(|| stopped.clone().err()));
        stopped
    }

    fn run_closed_callbacks(&self, error: Option<HubError>) {
        let callbacks = self
            .closed_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for callback in callbacks {
            let error = error.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(error))).is_err() {
                #[cfg(feature = "observability")]
                error!("Closed callback panicked");
            }
        }
    }

    /// Stops `session` if it is still the live one. A session that is still
    /// connecting is cancelled and its start attempt fails.
    pub(crate) fn stop_session(self: &Arc<Self>, session: &Arc<Session>, error: Option<HubError>) {
        let mut lifecycle = self.lifecycle();
        if !lifecycle.is_current(session) {
            return;
        }
        match lifecycle.state {
            ConnectionState::Connected => {
                let _ = self.begin_stop(&mut lifecycle, session.clone(), error);
            }
            ConnectionState::Connecting => {
                if let Some(error) = error {
                    session.record_error(error);
                }
                session.signal_shutdown();
            }
            ConnectionState::Disconnecting | ConnectionState::Disconnected => {}
        }
    }

    fn transport_closed(self: &Arc<Self>, session: &Arc<Session>, reason: Option<String>) {
        #[cfg(feature = "observability")]
        debug!(reason = ?reason, "Transport closed");

        session.mark_peer_closed();
        self.stop_session(session, reason.map(|reason| HubError::ConnectionClosed { reason }));
    }

    /// Returns the live session, or [`HubError::NotActive`].
    fn active_session(&self, method: &'static str) -> Result<Arc<Session>, HubError> {
        let lifecycle = self.lifecycle();
        match (&lifecycle.state, &lifecycle.session) {
            (ConnectionState::Connected, Some(session)) => Ok(session.clone()),
            _ => Err(HubError::NotActive { method }),
        }
    }
}

/// Removes an invocation from the registry when its caller stops waiting.
struct PendingGuard<'a> {
    session: &'a Session,
    invocation_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.session.registry.remove(self.invocation_id);
    }
}

/// A persistent connection to a hub.
///
/// Cloning is cheap; clones share the same connection.
///
/// # Examples
///
/// ```rust
/// use hubrpc::HubConnectionBuilder;
/// use hubrpc::transport::{MemoryTransport, TransportKind, TransportPreference};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), hubrpc::HubError> {
/// let (transport, _server) = MemoryTransport::pair();
/// let connection = HubConnectionBuilder::new("memory://hub")
///     .with_transport(Arc::new(transport))
///     .with_transport_preference(TransportPreference::Only(TransportKind::WebSockets))
///     .with_skip_negotiation(true)
///     .build()?;
///
/// connection.on("notify", |(message,): (String,)| async move {
///     println!("server says {}", message);
/// });
///
/// connection.start().await?;
/// connection.send("broadcast", ("hello",)).await?;
/// connection.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HubConnection {
    inner: Arc<ConnectionInner>,
}

impl HubConnection {
    pub(crate) fn new(
        base_url: String,
        config: HubConnectionConfig,
        protocol: Arc<dyn HubProtocol>,
        negotiator: Option<NegotiationClient>,
        transports: TransportSource,
        token_provider: Option<SharedAccessTokenProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                protocol,
                negotiator,
                transports,
                token_provider,
                handlers: Arc::new(HandlerTable::default()),
                closed_callbacks: Mutex::new(Vec::new()),
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Disconnected,
                    base_url,
                    session: None,
                    start_task: None,
                    stop_task: None,
                    connection_id: None,
                }),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle().state
    }

    /// The connection id assigned by the server, while connected.
    pub fn connection_id(&self) -> Option<String> {
        self.inner.lifecycle().connection_id.clone()
    }

    /// The URL used by the next `start`.
    pub fn base_url(&self) -> String {
        self.inner.lifecycle().base_url.clone()
    }

    /// Changes the URL used by the next `start`.
    ///
    /// # Errors
    ///
    /// Fails unless the connection is disconnected.
    pub fn set_base_url(&self, url: impl Into<String>) -> Result<(), HubError> {
        let url = url.into();
        if url.is_empty() {
            return Err(HubError::invalid_state("The HubConnection url must be a valid url."));
        }
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.state != ConnectionState::Disconnected {
            return Err(HubError::invalid_state(
                "The HubConnection must be in the disconnected state to change the url.",
            ));
        }
        lifecycle.base_url = url;
        Ok(())
    }

    /// The protocol spoken on this connection.
    pub fn protocol(&self) -> &Arc<dyn HubProtocol> {
        &self.inner.protocol
    }

    /// The configuration this connection was built with.
    pub fn config(&self) -> &HubConnectionConfig {
        &self.inner.config
    }

    /// Starts the connection.
    ///
    /// Joins an attempt already in flight, succeeds immediately when already
    /// connected, and waits for a stop in progress before starting again.
    ///
    /// # Errors
    ///
    /// Fails with the negotiation, transport or handshake error that ended
    /// the attempt, or [`HubError::ClosedDuringStart`] when it was stopped.
    pub async fn start(&self) -> Result<(), HubError> {
        loop {
            let (start_task, stop_task) = {
                let mut lifecycle = self.inner.lifecycle();
                match lifecycle.state {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Connecting => (lifecycle.start_task.clone(), None),
                    ConnectionState::Disconnecting => (None, lifecycle.stop_task.clone()),
                    ConnectionState::Disconnected => {
                        let session = Arc::new(Session::new(
                            Arc::downgrade(&self.inner),
                            self.inner.protocol.clone(),
                            self.inner.handlers.clone(),
                        ));
                        let task = spawn_shared(ConnectionInner::run_start(
                            self.inner.clone(),
                            session.clone(),
                            lifecycle.base_url.clone(),
                        ));

                        #[cfg(feature = "observability")]
                        info!(url = %lifecycle.base_url, "Starting connection");

                        lifecycle.state = ConnectionState::Connecting;
                        lifecycle.session = Some(session);
                        lifecycle.start_task = Some(task.clone());
                        (Some(task), None)
                    }
                }
            };

            match (start_task, stop_task) {
                (Some(task), _) => return task.await,
                (None, Some(task)) => {
                    let _ = task.await;
                }
                (None, None) => tokio::task::yield_now().await,
            }
        }
    }

    /// Stops the connection.
    ///
    /// Concurrent callers share one stop sequence. Pending invocations and
    /// streams fail with [`HubError::Canceled`].
    ///
    /// # Errors
    ///
    /// Returns the error the transport reported while stopping.
    pub async fn stop(&self) -> Result<(), HubError> {
        let task = {
            let mut lifecycle = self.inner.lifecycle();
            match lifecycle.state {
                ConnectionState::Disconnected => return Ok(()),
                ConnectionState::Disconnecting => lifecycle.stop_task.clone(),
                ConnectionState::Connecting | ConnectionState::Connected => {
                    match lifecycle.session.clone() {
                        Some(session) => Some(self.inner.begin_stop(&mut lifecycle, session, None)),
                        None => None,
                    }
                }
            }
        };
        match task {
            Some(task) => task.await,
            None => Ok(()),
        }
    }

    /// Registers a callback run after the connection closes.
    ///
    /// The callback receives the error that closed the connection, or `None`
    /// for a clean stop. A panicking callback does not affect the others.
    pub fn on_closed<F>(&self, callback: F)
    where
        F: Fn(Option<HubError>) + Send + Sync + 'static,
    {
        self.inner
            .closed_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Registers a handler for invocations of `target`.
    ///
    /// Arguments are bound to `A`, typically a tuple.
    pub fn on<A, F, Fut>(&self, target: &str, handler: F) -> Subscription
    where
        A: HubArguments,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let callback: HandlerCallback = Arc::new(move |values: Vec<Value>| {
            let handler = handler.clone();
            async move {
                let arguments = A::from_values(values).map_err(HandlerError::from)?;
                handler(arguments).await;
                Ok::<_, HandlerError>(None)
            }
            .boxed()
        });
        let key = self.inner.handlers.add(target, A::parameter_types(), callback);

        #[cfg(feature = "observability")]
        debug!(method = target, "Registered handler");

        Subscription::new(&self.inner.handlers, target, key)
    }

    /// Registers the handler that answers invocations of `target` which
    /// expect a result.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::DuplicateResultHandler`] when `target` already
    /// has a result handler.
    pub fn on_with_result<A, R, F, Fut>(
        &self,
        target: &str,
        handler: F,
    ) -> Result<Subscription, HubError>
    where
        A: HubArguments,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let callback: HandlerCallback = Arc::new(move |values: Vec<Value>| {
            let handler = handler.clone();
            async move {
                let arguments = A::from_values(values).map_err(HandlerError::from)?;
                let result = handler(arguments).await?;
                Ok::<_, HandlerError>(Some(serde_json::to_value(result)?))
            }
            .boxed()
        });
        let key = self
            .inner
            .handlers
            .add_result_handler(target, A::parameter_types(), callback)?;

        #[cfg(feature = "observability")]
        debug!(method = target, "Registered result handler");

        Ok(Subscription::new(&self.inner.handlers, target, key))
    }

    /// Registers a handler that receives the raw argument values, bound
    /// against `parameter_types`.
    pub fn on_raw<F, Fut>(
        &self,
        target: &str,
        parameter_types: Vec<ParameterType>,
        handler: F,
    ) -> Subscription
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let callback: HandlerCallback = Arc::new(move |values: Vec<Value>| {
            let handler = handler.clone();
            async move {
                handler(values).await;
                Ok::<_, HandlerError>(None)
            }
            .boxed()
        });
        let key = self.inner.handlers.add(target, parameter_types, callback);
        Subscription::new(&self.inner.handlers, target, key)
    }

    /// Removes every handler registered for `target`.
    pub fn remove(&self, target: &str) {
        self.inner.handlers.remove_target(target);
    }

    /// Invokes `target` without waiting for a result.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::NotActive`] unless connected, and with the
    /// serialization or transport error that prevented sending.
    pub async fn send(
        &self,
        target: &str,
        arguments: impl Into<Arguments>,
    ) -> Result<(), HubError> {
        let session = self.inner.active_session("send")?;
        let (values, streams) = arguments.into().into_parts()?;
        let stream_ids = session.uploads.attach(&session.ids, streams)?;

        let message =
            InvocationMessage::new(None, target, values).with_stream_ids(stream_ids.clone());
        if let Err(error) = session.send_message(&HubMessage::Invocation(message)).await {
            session.uploads.discard(&stream_ids);
            return Err(error);
        }
        session.uploads.launch(&session);
        Ok(())
    }

    /// Invokes `target` and waits for its result.
    ///
    /// Dropping the returned future forgets the invocation; a completion
    /// that arrives later is ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::NotActive`] unless connected,
    /// [`HubError::Invocation`] when the server reports an error,
    /// [`HubError::InvalidResult`] when the result does not bind to `T`, and
    /// [`HubError::Canceled`] when the connection stops first.
    pub async fn invoke<T>(
        &self,
        target: &str,
        arguments: impl Into<Arguments>,
    ) -> Result<T, HubError>
    where
        T: DeserializeOwned + 'static,
    {
        let session = self.inner.active_session("invoke")?;
        let (values, streams) = arguments.into().into_parts()?;

        let invocation_id = session.ids.next_id();
        let receiver = session
            .registry
            .register_invocation(&invocation_id, ParameterType::of::<T>());
        let _guard = PendingGuard {
            session: &session,
            invocation_id: &invocation_id,
        };
        let stream_ids = session.uploads.attach(&session.ids, streams)?;

        let message = InvocationMessage::new(Some(invocation_id.clone()), target, values)
            .with_stream_ids(stream_ids.clone());
        if let Err(error) = session.send_message(&HubMessage::Invocation(message)).await {
            session.uploads.discard(&stream_ids);
            return Err(error);
        }
        session.uploads.launch(&session);

        let value = receiver.await.unwrap_or(Err(HubError::Canceled))?;
        serde_json::from_value(value).map_err(|e| HubError::InvalidResult {
            reason: e.to_string(),
        })
    }

    /// Starts a server-to-client stream from `target`.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::NotActive`] unless connected, and with the
    /// serialization or transport error that prevented sending.
    pub async fn stream<T>(
        &self,
        target: &str,
        arguments: impl Into<Arguments>,
    ) -> Result<HubStream<T>, HubError>
    where
        T: DeserializeOwned + 'static,
    {
        let session = self.inner.active_session("stream")?;
        let (values, streams) = arguments.into().into_parts()?;

        let invocation_id = session.ids.next_id();
        let receiver = session
            .registry
            .register_stream(&invocation_id, ParameterType::of::<T>());
        let stream_ids = match session.uploads.attach(&session.ids, streams) {
            Ok(stream_ids) => stream_ids,
            Err(error) => {
                session.registry.remove(&invocation_id);
                return Err(error);
            }
        };

        let message = StreamInvocationMessage::new(invocation_id.as_str(), target, values)
            .with_stream_ids(stream_ids.clone());
        if let Err(error) = session.send_message(&HubMessage::StreamInvocation(message)).await {
            session.registry.remove(&invocation_id);
            session.uploads.discard(&stream_ids);
            return Err(error);
        }
        session.uploads.launch(&session);

        Ok(HubStream::new(invocation_id, receiver, &session))
    }
}

impl fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lifecycle();
        f.debug_struct("HubConnection")
            .field("state", &lifecycle.state)
            .field("base_url", &lifecycle.base_url)
            .field("protocol", &self.inner.protocol.name())
            .finish()
    }
}

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

//! Core transport traits.

use crate::auth::SharedAccessTokenProvider;
use crate::protocol::TransferFormat;
use crate::transport::{TransportError, TransportKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Invoked with every chunk of bytes received from the server.
///
/// Chunks carry no framing guarantees: a chunk may hold several messages or
/// part of one.
pub type ReceiveCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Invoked once when the transport closes, with an error description for an
/// abnormal close.
pub type CloseCallback = Arc<dyn Fn(Option<String>) + Send + Sync>;

/// A message-oriented duplex channel to a hub server.
///
/// The connection engine installs both callbacks before calling
/// [`start`](Self::start), then sends framed messages with
/// [`send`](Self::send). Receive callbacks must not block; the engine only
/// queues the bytes.
///
/// A transport may be started again after it has been stopped.
///
/// # Examples
///
/// Implementing a transport that drops everything:
///
/// ```rust
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use hubrpc::protocol::TransferFormat;
/// use hubrpc::transport::{CloseCallback, ReceiveCallback, Transport, TransportError};
///
/// struct NullTransport;
///
/// #[async_trait]
/// impl Transport for NullTransport {
///     async fn start(&self, _url: &str, _format: TransferFormat) -> Result<(), TransportError> {
///         Ok(())
///     }
///     async fn send(&self, _data: Bytes) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn set_on_receive(&self, _callback: ReceiveCallback) {}
///     fn set_on_close(&self, _callback: CloseCallback) {}
///     async fn stop(&self) -> Result<(), TransportError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to `url` using `format` framing.
    async fn start(&self, url: &str, format: TransferFormat) -> Result<(), TransportError>;

    /// Sends one or more complete framed messages.
    async fn send(&self, data: Bytes) -> Result<(), TransportError>;

    /// Installs the receive callback, replacing any previous one.
    fn set_on_receive(&self, callback: ReceiveCallback);

    /// Installs the close callback, replacing any previous one.
    fn set_on_close(&self, callback: CloseCallback);

    /// Disconnects. Stopping a stopped transport succeeds.
    async fn stop(&self) -> Result<(), TransportError>;
}

/// Everything a transport factory needs to build a transport.
#[derive(Clone, Default)]
pub struct TransportContext {
    /// Headers to send with every transport request.
    pub headers: BTreeMap<String, String>,
    /// Token source for transports that authenticate.
    pub access_token_provider: Option<SharedAccessTokenProvider>,
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field(
                "access_token_provider",
                &self.access_token_provider.is_some(),
            )
            .finish()
    }
}

/// Builds a transport for the kind chosen during negotiation.
pub trait TransportFactory: Send + Sync {
    /// Creates an unstarted transport of `kind`.
    fn create(
        &self,
        kind: TransportKind,
        context: TransportContext,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

impl<F> TransportFactory for F
where
    F: Fn(TransportKind, TransportContext) -> Result<Arc<dyn Transport>, TransportError>
        + Send
        + Sync,
{
    fn create(
        &self,
        kind: TransportKind,
        context: TransportContext,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self(kind, context)
    }
}

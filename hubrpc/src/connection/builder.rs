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

//! Builder for hub connections.

use crate::HubError;
use crate::auth::{AccessTokenProvider, SharedAccessTokenProvider};
use crate::connection::hub_connection::TransportSource;
use crate::connection::{HubConnection, HubConnectionConfig};
use crate::http::HttpClient;
use crate::negotiate::NegotiationClient;
use crate::protocol::{HubProtocol, JsonHubProtocol};
use crate::transport::{Transport, TransportFactory, TransportKind, TransportPreference};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating and configuring a [`HubConnection`].
///
/// A connection needs a source of transports: either a
/// [`TransportFactory`] that builds the transport negotiation selected, or a
/// single pre-built [`Transport`]. The JSON protocol is used unless another
/// one is set.
///
/// # Examples
///
/// ## Negotiating connection
///
/// ```rust
/// use hubrpc::HubConnectionBuilder;
/// use hubrpc::transport::{MemoryTransport, Transport, TransportContext, TransportError, TransportKind};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), hubrpc::HubError> {
/// let factory = |_kind: TransportKind, _context: TransportContext| {
///     let (transport, _server) = MemoryTransport::pair();
///     Ok::<Arc<dyn Transport>, TransportError>(Arc::new(transport))
/// };
///
/// let connection = HubConnectionBuilder::new("https://example.com/chat")
///     .with_transport_factory(factory)
///     .with_header("X-Tenant", "blue")
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// ## Direct WebSockets connection
///
/// ```rust
/// use hubrpc::HubConnectionBuilder;
/// use hubrpc::transport::{MemoryTransport, TransportKind};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), hubrpc::HubError> {
/// let (transport, _server) = MemoryTransport::pair();
/// let connection = HubConnectionBuilder::new("wss://example.com/chat")
///     .with_transport(Arc::new(transport))
///     .with_transport_kind(TransportKind::WebSockets)
///     .with_skip_negotiation(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HubConnectionBuilder {
    url: String,
    config: HubConnectionConfig,
    protocol: Option<Arc<dyn HubProtocol>>,
    http_client: Option<Arc<dyn HttpClient>>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    transport: Option<Arc<dyn Transport>>,
    access_token_provider: Option<SharedAccessTokenProvider>,
}

impl HubConnectionBuilder {
    /// Creates a builder for the hub at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: HubConnectionConfig::default(),
            protocol: None,
            http_client: None,
            transport_factory: None,
            transport: None,
            access_token_provider: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: HubConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the hub protocol.
    pub fn with_protocol(mut self, protocol: impl HubProtocol + 'static) -> Self {
        self.protocol = Some(Arc::new(protocol));
        self
    }

    /// Sets the HTTP client used for negotiation.
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the factory that builds the negotiated transport.
    pub fn with_transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.transport_factory = Some(Arc::new(factory));
        self
    }

    /// Uses `transport` for every start instead of a factory.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the access-token provider.
    pub fn with_access_token_provider(
        mut self,
        provider: impl AccessTokenProvider + 'static,
    ) -> Self {
        self.access_token_provider = Some(Arc::new(provider));
        self
    }

    /// Adds a header sent with negotiation and handed to transports.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.with_header(name, value);
        self
    }

    /// Sets the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_handshake_timeout(timeout);
        self
    }

    /// Sets the server timeout.
    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_server_timeout(timeout);
        self
    }

    /// Sets the keep-alive interval.
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_keep_alive_interval(interval);
        self
    }

    /// Sets which transports negotiation may select.
    pub fn with_transport_preference(mut self, preference: TransportPreference) -> Self {
        self.config = self.config.with_transport_preference(preference);
        self
    }

    /// Restricts negotiation to `kind`.
    pub fn with_transport_kind(mut self, kind: TransportKind) -> Self {
        self.config = self.config.with_transport(kind);
        self
    }

    /// Skips negotiation. Requires the WebSockets transport.
    pub fn with_skip_negotiation(mut self, skip: bool) -> Self {
        self.config = self.config.with_skip_negotiation(skip);
        self
    }

    /// Builds the connection.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Configuration`] for an invalid configuration,
    /// a missing transport source or a missing HTTP client, and with
    /// [`HubError::SkipNegotiationUnsupported`] when negotiation is skipped
    /// for a transport other than WebSockets.
    pub fn build(self) -> Result<HubConnection, HubError> {
        let configuration = |reason: String| HubError::Configuration { reason };

        self.config.validate().map_err(configuration)?;
        if self.url.is_empty() {
            return Err(configuration("a hub url is required".to_string()));
        }
        let websockets_only = TransportPreference::Only(TransportKind::WebSockets);
        if self.config.skip_negotiation && self.config.transport_preference != websockets_only {
            return Err(HubError::SkipNegotiationUnsupported);
        }

        let transports = match (self.transport, self.transport_factory) {
            (Some(transport), None) => TransportSource::Fixed(transport),
            (None, Some(factory)) => TransportSource::Factory(factory),
            (Some(_), Some(_)) => {
                return Err(configuration(
                    "a transport and a transport factory are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(configuration(
                    "a transport or a transport factory is required".to_string(),
                ));
            }
        };

        let negotiator = if self.config.skip_negotiation {
            None
        } else {
            let http_client = match self.http_client {
                Some(client) => client,
                None => default_http_client().ok_or_else(|| {
                    configuration("an HTTP client is required for negotiation".to_string())
                })?,
            };
            Some(NegotiationClient::new(http_client, self.config.headers.clone()))
        };

        let protocol = self
            .protocol
            .unwrap_or_else(|| Arc::new(JsonHubProtocol::new()));

        Ok(HubConnection::new(
            self.url,
            self.config,
            protocol,
            negotiator,
            transports,
            self.access_token_provider,
        ))
    }
}

#[cfg(feature = "reqwest")]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    Some(Arc::new(crate::http::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "reqwest"))]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::transport::MemoryTransport;

    fn memory() -> Arc<dyn Transport> {
        Arc::new(MemoryTransport::pair().0)
    }

    #[test]
    fn test_build_defaults() {
        let connection = HubConnectionBuilder::new("http://example.com/hub")
            .with_transport(memory())
            .build()
            .unwrap();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.protocol().name(), "json");
        assert_eq!(connection.base_url(), "http://example.com/hub");
        assert_eq!(connection.connection_id(), None);
    }

    #[test]
    fn test_build_requires_transport_source() {
        let err = HubConnectionBuilder::new("http://example.com/hub")
            .build()
            .unwrap_err();
        assert!(matches!(err, HubError::Configuration { .. }));
    }

    #[test]
    fn test_skip_negotiation_requires_websockets() {
        let err = HubConnectionBuilder::new("http://example.com/hub")
            .with_transport(memory())
            .with_skip_negotiation(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, HubError::SkipNegotiationUnsupported));

        assert!(
            HubConnectionBuilder::new("ws://example.com/hub")
                .with_transport(memory())
                .with_transport_kind(TransportKind::WebSockets)
                .with_skip_negotiation(true)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = HubConnectionBuilder::new("http://example.com/hub")
            .with_transport(memory())
            .with_server_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, HubError::Configuration { .. }));
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let err = HubConnectionBuilder::new("")
            .with_transport(memory())
            .build()
            .unwrap_err();
        assert!(err.is_local());
    }
}

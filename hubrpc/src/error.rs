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

//! Top-level error type for hubrpc.
//!
//! [`HubError`] composes the leaf errors of each layer and adds the failures
//! the connection engine raises itself:
//!
//! 1. **Codec**: malformed frames and handshake responses ([`ProtocolError`])
//! 2. **Transport**: failures starting, sending on or stopping a transport
//!    ([`TransportError`])
//! 3. **Negotiation**: HTTP failures ([`HttpError`]) and negotiate responses
//!    the client can not use
//! 4. **Peer**: errors reported by the server for a single invocation
//! 5. **Local state**: calls made in the wrong connection state
//!
//! # Error Handling Strategy
//!
//! - **Codec, transport and liveness errors** close the connection
//! - **Negotiation and handshake errors** fail `start()`
//! - **Peer errors** fail one invocation, the connection stays open
//! - **Local state errors** fail fast and leave the connection untouched
//!
//! Every variant is `Clone` so a shared start or stop future can hand the
//! same error to every waiter.
//!
//! # Examples
//!
//! ```rust
//! use hubrpc::HubError;
//!
//! let error = HubError::NotActive { method: "invoke" };
//! assert!(error.is_local());
//! assert_eq!(
//!     error.to_string(),
//!     "The 'invoke' method cannot be called if the connection is not active."
//! );
//! ```

use crate::http::HttpError;
use crate::protocol::ProtocolError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for hub connection operations.
#[derive(Debug, Clone)]
pub enum HubError {
    /// A frame or handshake response could not be decoded or encoded.
    Protocol(ProtocolError),

    /// The transport failed.
    Transport(TransportError),

    /// The negotiate request could not be sent.
    Http(HttpError),

    /// The negotiate endpoint answered with a non-success status.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hubrpc::HubError;
    ///
    /// let error = HubError::NegotiateStatus { status: 404, reason: "Not Found".into() };
    /// assert_eq!(error.status_code(), Some(404));
    /// assert!(error.is_negotiation_error());
    /// ```
    NegotiateStatus {
        /// HTTP status code.
        status: u16,
        /// HTTP reason phrase.
        reason: String,
    },

    /// The negotiate response carried an `error` property.
    NegotiateRejected {
        /// The server's message, verbatim.
        message: String,
    },

    /// The negotiate response could not be parsed.
    NegotiateInvalid {
        /// Parser diagnostic.
        reason: String,
    },

    /// The server kept redirecting past the redirect limit.
    RedirectLimitExceeded,

    /// The server speaks an older, incompatible negotiate dialect.
    IncompatibleServer,

    /// No transport offered by the server matches the client's preference and
    /// transfer format.
    NoCompatibleTransport,

    /// Negotiation was skipped without selecting the WebSockets transport.
    SkipNegotiationUnsupported,

    /// The server rejected the handshake.
    HandshakeRejected {
        /// The server's message.
        error: String,
    },

    /// The server did not answer the handshake in time.
    HandshakeTimeout,

    /// The transport closed before the handshake completed.
    ClosedDuringStart,

    /// The server did not send anything for the server timeout.
    ServerTimeout,

    /// A call that requires a connected hub was made in another state.
    NotActive {
        /// Name of the rejected method.
        method: &'static str,
    },

    /// The operation is not allowed in the current state.
    InvalidState {
        /// Description of the violation.
        reason: String,
    },

    /// The connection configuration is invalid.
    Configuration {
        /// Description of the problem.
        reason: String,
    },

    /// A second result handler was registered for a target.
    DuplicateResultHandler {
        /// The target that already has a result handler.
        target: String,
    },

    /// The invocation was canceled because the connection stopped cleanly or
    /// the caller dropped it.
    Canceled,

    /// The server completed the invocation with an error.
    Invocation {
        /// The server's message.
        message: String,
    },

    /// The connection closed with an error while the operation was pending.
    ConnectionClosed {
        /// The close reason.
        reason: String,
    },

    /// The access-token provider failed.
    AccessToken {
        /// The provider's message, verbatim.
        reason: String,
    },

    /// A result or stream item could not be bound to the requested type.
    InvalidResult {
        /// Description of the binding error.
        reason: String,
    },

    /// Arguments could not be serialized.
    Serialization {
        /// Description of the serialization error.
        reason: String,
    },
}

impl HubError {
    /// Returns `true` if the invocation was canceled rather than failed.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns `true` for failures of the negotiate exchange.
    #[must_use]
    pub const fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::NegotiateStatus { .. }
                | Self::NegotiateRejected { .. }
                | Self::NegotiateInvalid { .. }
                | Self::RedirectLimitExceeded
                | Self::IncompatibleServer
                | Self::NoCompatibleTransport
                | Self::SkipNegotiationUnsupported
        )
    }

    /// Returns `true` for errors raised locally before anything was sent,
    /// which leave the connection state untouched.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotActive { .. }
                | Self::InvalidState { .. }
                | Self::Configuration { .. }
                | Self::DuplicateResultHandler { .. }
                | Self::Serialization { .. }
        )
    }

    /// Returns the HTTP status code of a failed negotiate request.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NegotiateStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "{}", e),
            Self::Transport(e) => write!(f, "{}", e),
            Self::Http(e) => write!(f, "{}", e),
            Self::NegotiateStatus { status, reason } => write!(
                f,
                "Unexpected status code returned from negotiate: {} {}.",
                status, reason
            ),
            Self::NegotiateRejected { message } => f.write_str(message),
            Self::NegotiateInvalid { reason } => {
                write!(f, "Invalid negotiate response: {}", reason)
            }
            Self::RedirectLimitExceeded => f.write_str("Negotiate redirection limit exceeded."),
            Self::IncompatibleServer => f.write_str(
                "Detected an incompatible server. This client only supports servers that speak \
                 the hub negotiate protocol.",
            ),
            Self::NoCompatibleTransport => {
                f.write_str("There were no compatible transports on the server.")
            }
            Self::SkipNegotiationUnsupported => f.write_str(
                "Negotiation can only be skipped when using the WebSocket transport directly \
                 with 'TransportPreference::Only(TransportKind::WebSockets)'.",
            ),
            Self::HandshakeRejected { error } => write!(f, "Error in handshake {}.", error),
            Self::HandshakeTimeout => f.write_str(
                "Timed out waiting for the server to respond to the handshake message.",
            ),
            Self::ClosedDuringStart => {
                f.write_str("Connection closed while trying to connect.")
            }
            Self::ServerTimeout => f.write_str(
                "Server timeout elapsed without receiving a message from the server.",
            ),
            Self::NotActive { method } => write!(
                f,
                "The '{}' method cannot be called if the connection is not active.",
                method
            ),
            Self::InvalidState { reason } => f.write_str(reason),
            Self::Configuration { reason } => write!(f, "Invalid configuration: {}", reason),
            Self::DuplicateResultHandler { target } => write!(
                f,
                "'{}' already has a value returning handler. Multiple return values are not supported.",
                target
            ),
            Self::Canceled => f.write_str("Invocation was canceled."),
            Self::Invocation { message } => f.write_str(message),
            Self::ConnectionClosed { reason } => f.write_str(reason),
            Self::AccessToken { reason } => f.write_str(reason),
            Self::InvalidResult { reason } => f.write_str(reason),
            Self::Serialization { reason } => {
                write!(f, "Failed to serialize arguments: {}", reason)
            }
        }
    }
}

impl StdError for HubError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for HubError {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }
}

impl From<TransportError> for HubError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<HttpError> for HubError {
    fn from(error: HttpError) -> Self {
        Self::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_messages() {
        assert_eq!(
            HubError::NegotiateStatus {
                status: 500,
                reason: "Internal Server Error".into()
            }
            .to_string(),
            "Unexpected status code returned from negotiate: 500 Internal Server Error."
        );
        assert_eq!(
            HubError::RedirectLimitExceeded.to_string(),
            "Negotiate redirection limit exceeded."
        );
        assert_eq!(
            HubError::NoCompatibleTransport.to_string(),
            "There were no compatible transports on the server."
        );
        assert_eq!(
            HubError::NegotiateRejected {
                message: "Test error.".into()
            }
            .to_string(),
            "Test error."
        );
    }

    #[test]
    fn test_classification() {
        assert!(HubError::Canceled.is_canceled());
        assert!(!HubError::Canceled.is_local());
        assert!(HubError::IncompatibleServer.is_negotiation_error());
        assert!(!HubError::HandshakeTimeout.is_negotiation_error());
        assert!(
            HubError::DuplicateResultHandler {
                target: "t".into()
            }
            .is_local()
        );
        assert_eq!(HubError::ServerTimeout.status_code(), None);
    }

    #[test]
    fn test_handshake_messages() {
        assert_eq!(
            HubError::HandshakeRejected {
                error: "Requested protocol 'messagepack' is not available".into()
            }
            .to_string(),
            "Error in handshake Requested protocol 'messagepack' is not available."
        );
        assert_eq!(
            HubError::HandshakeTimeout.to_string(),
            "Timed out waiting for the server to respond to the handshake message."
        );
    }

    #[test]
    fn test_source_chain() {
        let error: HubError = ProtocolError::ConflictingCompletion.into();
        assert!(error.source().is_some());
        assert!(HubError::Canceled.source().is_none());
    }
}

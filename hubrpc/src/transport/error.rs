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

//! Transport layer error types.
//!
//! Transport errors are the lowest level of the error hierarchy. They are
//! surfaced through [`HubError::Transport`](crate::HubError::Transport) when a
//! transport fails to start, send or stop.

use crate::protocol::TransferFormat;
use crate::transport::TransportKind;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in a [`Transport`](crate::transport::Transport).
///
/// # Examples
///
/// ```rust
/// use hubrpc::transport::TransportError;
///
/// let error = TransportError::NotStarted;
/// assert!(error.is_closed());
/// assert_eq!(error.to_string(), "transport has not been started");
/// ```
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport could not connect to the given URL.
    #[error("failed to start transport for {url}: {reason}")]
    StartFailed {
        /// The URL that failed to connect.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// A payload could not be written.
    #[error("failed to send data: {reason}")]
    SendFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,

    /// `send` or `stop` was called before `start`.
    #[error("transport has not been started")]
    NotStarted,

    /// The transport kind can not carry the requested transfer format.
    #[error("{kind} does not support the {format} transfer format")]
    UnsupportedTransferFormat {
        /// The transport kind.
        kind: TransportKind,
        /// The requested transfer format.
        format: TransferFormat,
    },

    /// No transport could be created for the negotiated kind.
    #[error("no transport is available for {kind}")]
    Unavailable {
        /// The transport kind.
        kind: TransportKind,
    },

    /// An I/O error occurred.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl TransportError {
    /// Returns `true` if the transport is closed or was never opened.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::NotStarted)
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        Self::Io {
            source: Arc::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion_keeps_source() {
        let error: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(std::error::Error::source(&error).is_some());
        assert!(!error.is_closed());
    }

    #[test]
    fn test_unsupported_format_message() {
        let error = TransportError::UnsupportedTransferFormat {
            kind: TransportKind::ServerSentEvents,
            format: TransferFormat::Binary,
        };
        assert_eq!(
            error.to_string(),
            "ServerSentEvents does not support the Binary transfer format"
        );
    }
}

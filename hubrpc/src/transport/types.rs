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

//! Transport identification and selection types.

use crate::protocol::TransferFormat;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a transport instance, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Creates a new transport ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport({})", self.0)
    }
}

/// The transport kinds a hub server may offer during negotiation.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::TransferFormat;
/// use hubrpc::transport::TransportKind;
///
/// let kind: TransportKind = "ServerSentEvents".parse().unwrap();
/// assert!(kind.supports(TransferFormat::Text));
/// assert!(!kind.supports(TransferFormat::Binary));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// A full-duplex socket.
    WebSockets,
    /// Server push over a long-lived HTTP response, text only.
    ServerSentEvents,
    /// Repeated HTTP polling.
    LongPolling,
}

impl TransportKind {
    /// The name used in negotiate responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSockets => "WebSockets",
            Self::ServerSentEvents => "ServerSentEvents",
            Self::LongPolling => "LongPolling",
        }
    }

    /// Client preference order; lower ranks are picked first.
    pub fn rank(self) -> u8 {
        match self {
            Self::WebSockets => 0,
            Self::ServerSentEvents => 1,
            Self::LongPolling => 2,
        }
    }

    /// Returns `true` if this kind can carry `format`.
    pub fn supports(self, format: TransferFormat) -> bool {
        match self {
            Self::ServerSentEvents => format == TransferFormat::Text,
            Self::WebSockets | Self::LongPolling => true,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WebSockets" => Ok(Self::WebSockets),
            "ServerSentEvents" => Ok(Self::ServerSentEvents),
            "LongPolling" => Ok(Self::LongPolling),
            other => Err(format!("unknown transport '{}'", other)),
        }
    }
}

/// Which transports the client is willing to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPreference {
    /// Any transport the server offers, best ranked first.
    #[default]
    Any,
    /// Only the given transport.
    Only(TransportKind),
}

impl TransportPreference {
    /// Returns `true` if `kind` is acceptable under this preference.
    pub fn allows(self, kind: TransportKind) -> bool {
        match self {
            Self::Any => true,
            Self::Only(only) => only == kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            TransportKind::WebSockets,
            TransportKind::ServerSentEvents,
            TransportKind::LongPolling,
        ] {
            assert_eq!(kind.as_str().parse::<TransportKind>().unwrap(), kind);
        }
        assert!("Carrier".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_preference() {
        assert!(TransportPreference::Any.allows(TransportKind::LongPolling));
        let only = TransportPreference::Only(TransportKind::WebSockets);
        assert!(only.allows(TransportKind::WebSockets));
        assert!(!only.allows(TransportKind::LongPolling));
    }

    #[test]
    fn test_transport_id_display() {
        assert_eq!(TransportId::new(7).to_string(), "Transport(7)");
    }
}

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

//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of a [`HubConnection`](crate::HubConnection).
///
/// ```text
/// Disconnected --start()--> Connecting --handshake ok--> Connected
///      ^                        |                            |
///      +------ failure ---------+                         stop()
///      |                                                     v
///      +-------------- transport stopped ----------- Disconnecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// Negotiating, starting the transport or waiting for the handshake.
    Connecting,
    /// The handshake completed; calls are allowed.
    Connected,
    /// Tearing the session down.
    Disconnecting,
}

impl ConnectionState {
    /// Returns `true` when `send`, `invoke` and `stream` are allowed.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` while a start or stop sequence is in flight.
    #[must_use]
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connected_is_active() {
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Disconnecting.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::default().to_string(), "Disconnected");
        assert_eq!(ConnectionState::Disconnecting.to_string(), "Disconnecting");
        assert!(ConnectionState::Connecting.is_transitioning());
    }
}

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

//! Configuration types for hub connections.

use crate::transport::{TransportKind, TransportPreference};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for a [`HubConnection`](crate::HubConnection).
///
/// # Examples
///
/// ```rust
/// use hubrpc::HubConnectionConfig;
/// use std::time::Duration;
///
/// let config = HubConnectionConfig::new()
///     .with_server_timeout(Duration::from_secs(60))
///     .with_keep_alive_interval(Duration::from_secs(20))
///     .with_header("X-Tenant", "blue");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConnectionConfig {
    /// How long to wait for the server's handshake response.
    pub handshake_timeout: Duration,

    /// Close the connection when nothing was received for this long.
    pub server_timeout: Duration,

    /// Send a ping when nothing was sent for this long.
    pub keep_alive_interval: Duration,

    /// Resolution of the liveness timers.
    pub tick_interval: Duration,

    /// Which transports negotiation may select.
    pub transport_preference: TransportPreference,

    /// Connect the WebSockets transport directly, without negotiating.
    pub skip_negotiation: bool,

    /// Headers sent with negotiate requests and handed to transports.
    pub headers: BTreeMap<String, String>,
}

impl Default for HubConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            keep_alive_interval: Duration::from_secs(15),
            tick_interval: Duration::from_secs(1),
            transport_preference: TransportPreference::Any,
            skip_negotiation: false,
            headers: BTreeMap::new(),
        }
    }
}

impl HubConnectionConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the server timeout.
    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// Sets the keep-alive interval.
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Sets the liveness tick.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the transport preference.
    pub fn with_transport_preference(mut self, preference: TransportPreference) -> Self {
        self.transport_preference = preference;
        self
    }

    /// Restricts negotiation to a single transport.
    pub fn with_transport(self, kind: TransportKind) -> Self {
        self.with_transport_preference(TransportPreference::Only(kind))
    }

    /// Enables or disables skipping negotiation.
    pub fn with_skip_negotiation(mut self, skip: bool) -> Self {
        self.skip_negotiation = skip;
        self
    }

    /// Adds a header, replacing an earlier value for the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.handshake_timeout.is_zero() {
            return Err("handshake_timeout must be greater than 0".to_string());
        }
        if self.server_timeout.is_zero() {
            return Err("server_timeout must be greater than 0".to_string());
        }
        if self.keep_alive_interval.is_zero() {
            return Err("keep_alive_interval must be greater than 0".to_string());
        }
        if self.tick_interval.is_zero() {
            return Err("tick_interval must be greater than 0".to_string());
        }
        if self.tick_interval > self.keep_alive_interval {
            return Err("tick_interval must not exceed keep_alive_interval".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConnectionConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.server_timeout, Duration::from_secs(30));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(15));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.transport_preference, TransportPreference::Any);
        assert!(!config.skip_negotiation);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = HubConnectionConfig::new()
            .with_handshake_timeout(Duration::from_secs(5))
            .with_server_timeout(Duration::from_secs(10))
            .with_keep_alive_interval(Duration::from_secs(4))
            .with_tick_interval(Duration::from_millis(500))
            .with_transport(TransportKind::WebSockets)
            .with_skip_negotiation(true)
            .with_header("A", "1")
            .with_header("A", "2");

        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.server_timeout, Duration::from_secs(10));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(4));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(
            config.transport_preference,
            TransportPreference::Only(TransportKind::WebSockets)
        );
        assert!(config.skip_negotiation);
        assert_eq!(config.headers.get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_validate_valid() {
        assert!(HubConnectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let config = HubConnectionConfig {
            handshake_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HubConnectionConfig {
            server_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HubConnectionConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_tick_longer_than_keep_alive() {
        let config = HubConnectionConfig::new()
            .with_keep_alive_interval(Duration::from_secs(1))
            .with_tick_interval(Duration::from_secs(2));
        assert!(config.validate().is_err());
    }
}

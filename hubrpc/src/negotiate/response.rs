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

//! The negotiate response payload.

use crate::HubError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transport offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    /// Transport name, e.g. `WebSockets`.
    pub transport: String,
    /// Transfer formats the transport can carry, e.g. `Text`, `Binary`.
    #[serde(default)]
    pub transfer_formats: Vec<String>,
}

/// Body of a negotiate response.
///
/// A response carries either a redirect (`url`, optionally `access_token`),
/// an `error`, or the connection details and offered transports.
///
/// # Examples
///
/// ```rust
/// use hubrpc::negotiate::NegotiateResponse;
///
/// let body = br#"{"connectionId":"abc","connectionToken":"tok","negotiateVersion":1,
///     "availableTransports":[{"transport":"WebSockets","transferFormats":["Text","Binary"]}]}"#;
/// let response = NegotiateResponse::parse(body).unwrap();
/// assert_eq!(response.connection_token.as_deref(), Some("tok"));
/// assert_eq!(response.available_transports[0].transport, "WebSockets");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Public connection id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Private connection token, used as the transport `id` from version 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_token: Option<String>,
    /// Negotiate protocol version spoken by the server.
    #[serde(default)]
    pub negotiate_version: u32,
    /// Redirect target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Token to use with the redirect target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Server-side negotiation failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Offered transports in server preference order.
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
}

impl NegotiateResponse {
    /// Parses a negotiate response body.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::IncompatibleServer`] for payloads of the legacy
    /// negotiate dialect and [`HubError::NegotiateInvalid`] for anything that
    /// is not a JSON object of the expected shape.
    pub fn parse(body: &[u8]) -> Result<Self, HubError> {
        let invalid = |reason: String| HubError::NegotiateInvalid { reason };

        let value: Value = serde_json::from_slice(body).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(object) = &value else {
            return Err(invalid("expected a JSON object".to_string()));
        };

        let legacy = object.contains_key("ProtocolVersion")
            || ((object.contains_key("Url") || object.contains_key("ConnectionToken"))
                && !object.contains_key("availableTransports"));
        if legacy {
            return Err(HubError::IncompatibleServer);
        }

        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
    }
}

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

//! Connection negotiation.
//!
//! Before a transport is opened the client POSTs to `{base}/negotiate` and
//! learns which transports the server offers, the connection id and token,
//! or a redirect to another endpoint. [`NegotiationClient`] runs that
//! exchange and produces a [`ResolvedEndpoint`] the connection engine hands
//! to its transport factory.
//!
//! # Sequence
//!
//! ```text
//! POST {url}/negotiate?negotiateVersion=1
//!   -> { "url": ..., "accessToken": ... }        follow redirect (max 100)
//!   -> { "error": ... }                          fail
//!   -> { "connectionToken": ..., "availableTransports": [...] }
//!        select first compatible transport
//!        transport url = {url}?id={connectionToken}
//! ```

mod client;
mod response;

pub use self::client::{
    MAX_NEGOTIATE_REDIRECTS, NEGOTIATE_VERSION, NegotiationClient, ResolvedEndpoint,
    USER_AGENT_HEADER, append_query, negotiate_url, select_transport, skip_negotiation,
    user_agent,
};
pub use self::response::{AvailableTransport, NegotiateResponse};

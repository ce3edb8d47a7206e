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

#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # hubrpc - Hub Connection Client
//!
//! hubrpc is the client side of a persistent-connection RPC protocol between
//! an application and a "hub" server. Over one long-lived transport both
//! peers may invoke named methods on each other:
//!
//! - **Negotiation**: an HTTP exchange that selects a transport, follows
//!   redirects and carries access tokens
//! - **Handshake**: agrees on the wire protocol before any traffic
//! - **Pluggable protocols**: JSON text framing and MessagePack binary framing
//! - **Pluggable transports**: WebSockets, server-sent events or long polling
//!   implementations plug in through [`transport::TransportFactory`]
//! - **Calls**: fire-and-forget sends, invocations awaiting a result and
//!   server-to-client streams
//! - **Uploads**: client-to-server streams passed as invocation arguments
//! - **Handlers**: methods the server calls on the client, optionally
//!   answering with a result
//! - **Liveness**: keep-alive pings and a server timeout
//!
//! ## Architecture
//!
//! - **[`protocol`]**: message model, handshake and the two codecs
//! - **[`negotiate`]**: the negotiate exchange and transport selection
//! - **[`http`]**: the HTTP client used for negotiation
//! - **[`transport`]**: the transport capability and an in-memory transport
//! - **[`auth`]**: access-token providers
//! - **[`connection`]**: the [`HubConnection`] engine
//!
//! ## Quick Start
//!
//! ```rust
//! use hubrpc::{HubConnectionBuilder, HubError};
//! use hubrpc::connection::Arguments;
//! use hubrpc::transport::{MemoryTransport, TransportKind};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), HubError> {
//! let (transport, _server) = MemoryTransport::pair();
//! let connection = HubConnectionBuilder::new("ws://localhost:5000/chat")
//!     .with_transport(Arc::new(transport))
//!     .with_transport_kind(TransportKind::WebSockets)
//!     .with_skip_negotiation(true)
//!     .build()?;
//!
//! let _subscription = connection.on("ReceiveMessage", |(user, text): (String, String)| async move {
//!     println!("{user}: {text}");
//! });
//!
//! connection.start().await?;
//! connection.send("SendMessage", ("alice", "hello")).await?;
//! let total: i64 = connection.invoke("Add", Arguments::new().arg(&1).arg(&2)).await?;
//! connection.stop().await?;
//! # let _ = total;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **`observability`** (default): structured `tracing` events
//! - **`messagepack`** (default): the MessagePack protocol
//! - **`reqwest`** (default): a `reqwest` based HTTP client for negotiation
//!
//! ## Error Handling
//!
//! Every public operation fails with [`HubError`]. Lower layers report
//! [`protocol::ProtocolError`], [`transport::TransportError`] and
//! [`http::HttpError`], which convert into it.
//!
//! ## Safety
//!
//! hubrpc is written in 100% safe Rust with `#![deny(unsafe_code)]`.
//! All concurrency is handled through Tokio's async runtime.

pub mod auth;
pub mod connection;
pub mod error;
pub mod http;
pub mod negotiate;
pub mod protocol;
pub mod transport;

pub use auth::{AccessTokenProvider, StaticAccessToken};
pub use connection::{
    Arguments, ConnectionState, HubConnection, HubConnectionBuilder, HubConnectionConfig,
    HubStream, Subscription, UploadSender, UploadStream, upload_channel,
};
pub use error::HubError;
pub use protocol::{HubMessage, HubProtocol, JsonHubProtocol, TransferFormat};
#[cfg(feature = "messagepack")]
pub use protocol::MessagePackHubProtocol;
pub use transport::{Transport, TransportError, TransportFactory, TransportKind};

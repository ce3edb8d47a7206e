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

//! Transport layer abstractions for hubrpc.
//!
//! The connection engine does not speak sockets itself. It depends on the
//! [`Transport`] capability: start against a URL, send framed bytes, receive
//! chunks through a callback and learn about closes through another one.
//! Concrete socket, server-sent-events and long-polling transports live
//! outside this crate and plug in through a [`TransportFactory`].
//!
//! # Architecture
//!
//! ```text
//! HubConnection --create(kind, context)--> TransportFactory
//!       |                                        |
//!       |  start(url, format) / send / stop      v
//!       +-------------------------------->  Transport
//!       <------ on_receive(bytes) ---------------+
//!       <------ on_close(error?) ----------------+
//! ```
//!
//! # Transport kinds
//!
//! | Kind | Text | Binary | Liveness timers |
//! |------|------|--------|-----------------|
//! | [`TransportKind::WebSockets`] | yes | yes | yes |
//! | [`TransportKind::ServerSentEvents`] | yes | no | yes |
//! | [`TransportKind::LongPolling`] | yes | yes | no |
//!
//! # In-Memory Transport (for testing)
//!
//! ```rust
//! use bytes::Bytes;
//! use hubrpc::protocol::TransferFormat;
//! use hubrpc::transport::{MemoryTransport, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (client, mut server) = MemoryTransport::pair();
//! client.start("memory://hub", TransferFormat::Text).await?;
//! client.send(Bytes::from_static(b"ping")).await?;
//! assert_eq!(server.next_sent().await.unwrap(), Bytes::from_static(b"ping"));
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod traits;
mod types;

pub use self::error::TransportError;
pub use self::memory::{MemoryServer, MemoryTransport};
pub use self::traits::{
    CloseCallback, ReceiveCallback, Transport, TransportContext, TransportFactory,
};
pub use self::types::{TransportId, TransportKind, TransportPreference};
pub use crate::protocol::TransferFormat;

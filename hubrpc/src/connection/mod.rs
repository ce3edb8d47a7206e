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

//! The hub connection engine.
//!
//! [`HubConnection`] owns the lifecycle state machine, runs negotiation and
//! the handshake, routes inbound messages to the invocation registry or to
//! registered handlers, and drives the liveness timers.
//!
//! # Lifecycle
//!
//! ```text
//! start()  Disconnected -> Connecting -> Connected
//! stop()   Connected -> Disconnecting -> Disconnected
//! ```
//!
//! Concurrent `start` calls join the attempt in flight; concurrent `stop`
//! calls share one stop sequence. Each start gets a fresh session, so ids,
//! pending calls and upload streams never leak across restarts. Handlers and
//! closed callbacks belong to the connection and persist.
//!
//! # Calls
//!
//! | Method | Message | Waits for |
//! |--------|---------|-----------|
//! | [`HubConnection::send`] | Invocation without id | nothing |
//! | [`HubConnection::invoke`] | Invocation with id | Completion |
//! | [`HubConnection::stream`] | StreamInvocation | StreamItems, then Completion |

mod arguments;
mod builder;
mod config;
mod dispatch;
mod handlers;
mod hub_connection;
mod id;
mod liveness;
mod registry;
mod session;
mod state;
mod stream;
mod upload;

pub use self::arguments::Arguments;
pub use self::builder::HubConnectionBuilder;
pub use self::config::HubConnectionConfig;
pub use self::dispatch::{BINDING_FAILURE_MESSAGE, NO_RESULT_MESSAGE};
pub use self::handlers::{HandlerError, HubArguments, Subscription};
pub use self::hub_connection::{ClosedCallback, HubConnection};
pub use self::id::InvocationIdGenerator;
pub use self::registry::{InvocationReceiver, InvocationRegistry, StreamReceiver};
pub use self::state::ConnectionState;
pub use self::stream::HubStream;
pub use self::upload::{UploadSender, UploadStream, upload_channel};

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

//! Keep-alive and server-timeout timers.
//!
//! Both timers share one tick. On every tick the monitor compares the time
//! since the last send and the last receive against the configured limits:
//! a quiet outbound side gets a `Ping`, a quiet inbound side ends the
//! session with [`HubError::ServerTimeout`].

use crate::HubError;
use crate::connection::HubConnectionConfig;
use crate::connection::session::Session;
use crate::protocol::HubMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// What the monitor does on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LivenessAction {
    Idle,
    Ping,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LivenessSettings {
    pub(crate) keep_alive_interval: Duration,
    pub(crate) server_timeout: Duration,
    pub(crate) tick_interval: Duration,
}

impl LivenessSettings {
    pub(crate) fn from_config(config: &HubConnectionConfig) -> Self {
        Self {
            keep_alive_interval: config.keep_alive_interval,
            server_timeout: config.server_timeout,
            tick_interval: config.tick_interval,
        }
    }

    /// A server timeout takes precedence over a due ping.
    pub(crate) fn evaluate(
        &self,
        now: Instant,
        last_sent: Instant,
        last_received: Instant,
    ) -> LivenessAction {
        if now.saturating_duration_since(last_received) >= self.server_timeout {
            LivenessAction::Timeout
        } else if now.saturating_duration_since(last_sent) >= self.keep_alive_interval {
            LivenessAction::Ping
        } else {
            LivenessAction::Idle
        }
    }
}

/// Arms the timers for a connected session. They stop with the session.
pub(crate) fn spawn(session: Arc<Session>, settings: LivenessSettings) -> JoinHandle<()> {
    tokio::spawn(run(session, settings))
}

async fn run(session: Arc<Session>, settings: LivenessSettings) {
    let mut ticker = interval_at(
        Instant::now() + settings.tick_interval,
        settings.tick_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = session.closed() => return,
        }

        match settings.evaluate(Instant::now(), session.last_sent(), session.last_received()) {
            LivenessAction::Idle => {}
            LivenessAction::Ping => {
                if let Err(_error) = session.send_message(&HubMessage::Ping).await {
                    #[cfg(feature = "observability")]
                    debug!(error = %_error, "Failed to send keep-alive ping");
                }
            }
            LivenessAction::Timeout => {
                #[cfg(feature = "observability")]
                warn!(
                    server_timeout = ?settings.server_timeout,
                    "Server timeout elapsed without receiving a message"
                );
                session.request_stop(Some(HubError::ServerTimeout));
                return;
            }
        }
    }
}

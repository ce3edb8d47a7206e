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

//! Server-to-client streams.

use crate::HubError;
use crate::connection::registry::StreamReceiver;
use crate::connection::session::Session;
use futures_util::Stream;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Removes the stream from the registry and cancels it on the server when
/// the last handle goes away before completion.
struct StreamGuard {
    invocation_id: String,
    session: Weak<Session>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        if session.registry.remove(&self.invocation_id) {
            session.spawn_cancel(self.invocation_id.clone());
        }
    }
}

/// Items streamed by the server for one `stream` call.
///
/// Items are deserialized into `T` as they are polled. A final payload on the
/// completion is yielded as the last item; an error completion is yielded as
/// the last element.
///
/// Cloning subscribes to items that arrive after the clone was made. The
/// server is asked to cancel the stream only when every clone has been
/// dropped before the stream completed.
pub struct HubStream<T> {
    receiver: StreamReceiver,
    guard: Arc<StreamGuard>,
    finished: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HubStream<T> {
    pub(crate) fn new(
        invocation_id: String,
        receiver: StreamReceiver,
        session: &Arc<Session>,
    ) -> Self {
        Self {
            receiver,
            guard: Arc::new(StreamGuard {
                invocation_id,
                session: Arc::downgrade(session),
            }),
            finished: false,
            _marker: PhantomData,
        }
    }

    /// The invocation id of this stream.
    pub fn invocation_id(&self) -> &str {
        &self.guard.invocation_id
    }
}

impl<T> Clone for HubStream<T> {
    fn clone(&self) -> Self {
        let subscription = self
            .guard
            .session
            .upgrade()
            .and_then(|session| session.registry.subscribe_stream(&self.guard.invocation_id));

        let (receiver, finished) = match subscription {
            Some(receiver) => (receiver, false),
            None => (mpsc::unbounded_channel().1, true),
        };

        Self {
            receiver,
            guard: self.guard.clone(),
            finished,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for HubStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubStream")
            .field("invocation_id", &self.guard.invocation_id)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T: DeserializeOwned> Stream for HubStream<T> {
    type Item = Result<T, HubError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(
                serde_json::from_value(value).map_err(|e| HubError::InvalidResult {
                    reason: e.to_string(),
                }),
            )),
            Poll::Ready(Some(Err(error))) => {
                self.finished = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

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

//! Client-to-server streaming.
//!
//! [`upload_channel`] returns a typed [`UploadSender`] and the
//! [`UploadStream`] that is passed as an argument to `send` or `invoke`.
//! Every item sent becomes a `StreamItem` for the stream id the connection
//! assigned; dropping every sender completes the stream, and
//! [`UploadSender::fail`] completes it with an error.
//!
//! An upload stream used in several calls on one connection gets a fresh id
//! per call, and each item is forwarded to every id in the order the calls
//! were made.

use crate::HubError;
use crate::connection::id::InvocationIdGenerator;
use crate::connection::session::Session;
use crate::protocol::{CompletionMessage, HubMessage, StreamItemMessage};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::debug;

enum UploadEvent {
    Item(Value),
    Error(String),
}

type EventReceiver = mpsc::UnboundedReceiver<UploadEvent>;

struct UploadSource {
    receiver: Mutex<Option<EventReceiver>>,
}

impl UploadSource {
    fn receiver(&self) -> MutexGuard<'_, Option<EventReceiver>> {
        self.receiver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a connected upload sender and stream.
///
/// # Examples
///
/// ```rust
/// use hubrpc::connection::{Arguments, upload_channel};
///
/// let (sender, stream) = upload_channel::<u32>();
/// let arguments = Arguments::new().arg("numbers").stream(stream);
///
/// sender.send(&1).unwrap();
/// sender.send(&2).unwrap();
/// sender.complete();
/// # drop(arguments);
/// ```
pub fn upload_channel<T: Serialize>() -> (UploadSender<T>, UploadStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        UploadSender {
            sender,
            _marker: PhantomData,
        },
        UploadStream {
            source: Arc::new(UploadSource {
                receiver: Mutex::new(Some(receiver)),
            }),
        },
    )
}

/// Producer half of an upload stream.
///
/// Items may be sent before the stream is attached to a call; they are
/// buffered until then. The stream completes when every clone of the sender
/// has been dropped.
pub struct UploadSender<T> {
    sender: mpsc::UnboundedSender<UploadEvent>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Serialize> UploadSender<T> {
    /// Queues one item.
    ///
    /// # Errors
    ///
    /// Fails when `item` can not be serialized or the stream was detached
    /// from its connection.
    pub fn send(&self, item: &T) -> Result<(), HubError> {
        let value = serde_json::to_value(item).map_err(|e| HubError::Serialization {
            reason: e.to_string(),
        })?;
        self.sender
            .send(UploadEvent::Item(value))
            .map_err(|_| HubError::invalid_state("The upload stream is closed."))
    }
}

impl<T> UploadSender<T> {
    /// Completes the stream with an error instead of a success completion.
    pub fn fail(self, error: impl Into<String>) {
        let _ = self.sender.send(UploadEvent::Error(error.into()));
    }

    /// Completes the stream. Equivalent to dropping this sender when it is
    /// the last clone.
    pub fn complete(self) {}

    /// Returns `true` once the stream has been detached or consumed.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> Clone for UploadSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for UploadSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSender")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Consumer half of an upload stream, passed in call [`Arguments`](crate::connection::Arguments).
#[derive(Clone)]
pub struct UploadStream {
    source: Arc<UploadSource>,
}

impl fmt::Debug for UploadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadStream")
            .field("attached", &self.source.receiver().is_none())
            .finish()
    }
}

struct UploadEntry {
    source: Arc<UploadSource>,
    ids: Vec<String>,
    receiver: Option<EventReceiver>,
}

/// Upload streams attached to one session.
#[derive(Default)]
pub(crate) struct UploadTracker {
    entries: Mutex<Vec<UploadEntry>>,
}

impl UploadTracker {
    fn entries(&self) -> MutexGuard<'_, Vec<UploadEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assigns a stream id to each stream, in argument order.
    ///
    /// Nothing flows until [`launch`](Self::launch) is called, so the
    /// invocation naming the ids can be sent first.
    pub(crate) fn attach(
        &self,
        ids: &InvocationIdGenerator,
        streams: Vec<UploadStream>,
    ) -> Result<Vec<String>, HubError> {
        let mut entries = self.entries();
        let mut stream_ids = Vec::with_capacity(streams.len());

        for stream in streams {
            if let Some(entry) = entries
                .iter_mut()
                .find(|entry| Arc::ptr_eq(&entry.source, &stream.source))
            {
                let id = ids.next_id();
                entry.ids.push(id.clone());
                stream_ids.push(id);
                continue;
            }

            let taken = stream.source.receiver().take();
            let Some(receiver) = taken else {
                drop(entries);
                self.discard(&stream_ids);
                return Err(HubError::invalid_state(
                    "The upload stream has already been consumed.",
                ));
            };
            let id = ids.next_id();
            entries.push(UploadEntry {
                source: stream.source,
                ids: vec![id.clone()],
                receiver: Some(receiver),
            });
            stream_ids.push(id);
        }

        Ok(stream_ids)
    }

    /// Forgets stream ids whose invocation was never sent.
    pub(crate) fn discard(&self, stream_ids: &[String]) {
        let mut entries = self.entries();
        for entry in entries.iter_mut() {
            entry.ids.retain(|id| !stream_ids.contains(id));
        }
        entries.retain_mut(|entry| {
            if !entry.ids.is_empty() {
                return true;
            }
            match entry.receiver.take() {
                Some(receiver) => {
                    *entry.source.receiver() = Some(receiver);
                    false
                }
                None => true,
            }
        });
    }

    /// Starts forwarding every attached stream that is not flowing yet.
    pub(crate) fn launch(&self, session: &Arc<Session>) {
        let mut entries = self.entries();
        for entry in entries.iter_mut() {
            if let Some(receiver) = entry.receiver.take() {
                tokio::spawn(forward(session.clone(), entry.source.clone(), receiver));
            }
        }
    }

    fn ids_for(&self, source: &Arc<UploadSource>) -> Vec<String> {
        self.entries()
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.source, source))
            .map(|entry| entry.ids.clone())
            .unwrap_or_default()
    }

    fn finish(&self, source: &Arc<UploadSource>) {
        self.entries()
            .retain(|entry| !Arc::ptr_eq(&entry.source, source));
    }

    /// Drops every stream. Senders see their stream as closed.
    pub(crate) fn detach_all(&self) {
        let detached = std::mem::take(&mut *self.entries());

        #[cfg(feature = "observability")]
        if !detached.is_empty() {
            debug!(count = detached.len(), "Detached upload streams");
        }

        drop(detached);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }
}

async fn forward(session: Arc<Session>, source: Arc<UploadSource>, mut receiver: EventReceiver) {
    loop {
        let event = tokio::select! {
            event = receiver.recv() => event,
            _ = session.closed() => return,
        };

        let ids = session.uploads.ids_for(&source);
        let (messages, finished): (Vec<HubMessage>, bool) = match event {
            Some(UploadEvent::Item(item)) => (
                ids.iter()
                    .map(|id| {
                        HubMessage::StreamItem(StreamItemMessage::new(id.as_str(), item.clone()))
                    })
                    .collect(),
                false,
            ),
            Some(UploadEvent::Error(error)) => (
                ids.iter()
                    .map(|id| {
                        let completion = CompletionMessage::with_error(id.as_str(), error.as_str());
                        HubMessage::Completion(completion)
                    })
                    .collect(),
                true,
            ),
            None => (
                ids.iter()
                    .map(|id| HubMessage::Completion(CompletionMessage::empty(id.as_str())))
                    .collect(),
                true,
            ),
        };

        for message in &messages {
            if let Err(_error) = session.send_message(message).await {
                #[cfg(feature = "observability")]
                debug!(error = %_error, "Failed to forward upload stream message");
            }
        }

        if finished {
            session.uploads.finish(&source);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_assigns_fresh_ids_per_use() {
        let tracker = UploadTracker::default();
        let ids = InvocationIdGenerator::new();
        let (_sender, stream) = upload_channel::<i32>();

        let first = tracker.attach(&ids, vec![stream.clone()]).unwrap();
        let second = tracker.attach(&ids, vec![stream.clone()]).unwrap();

        assert_eq!(first, vec!["1".to_string()]);
        assert_eq!(second, vec!["2".to_string()]);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.ids_for(&stream.source), vec!["1", "2"]);
    }

    #[test]
    fn test_discard_returns_stream_for_reuse() {
        let tracker = UploadTracker::default();
        let ids = InvocationIdGenerator::new();
        let (_sender, stream) = upload_channel::<i32>();

        let stream_ids = tracker.attach(&ids, vec![stream.clone()]).unwrap();
        tracker.discard(&stream_ids);
        assert_eq!(tracker.len(), 0);

        let other = UploadTracker::default();
        assert!(other.attach(&ids, vec![stream]).is_ok());
    }

    #[test]
    fn test_consumed_stream_can_not_attach_elsewhere() {
        let ids = InvocationIdGenerator::new();
        let (_sender, stream) = upload_channel::<i32>();

        let first = UploadTracker::default();
        first.attach(&ids, vec![stream.clone()]).unwrap();

        let second = UploadTracker::default();
        assert!(second.attach(&ids, vec![stream]).is_err());
    }

    #[test]
    fn test_sender_sees_detach() {
        let tracker = UploadTracker::default();
        let ids = InvocationIdGenerator::new();
        let (sender, stream) = upload_channel::<i32>();

        sender.send(&1).unwrap();
        tracker.attach(&ids, vec![stream]).unwrap();
        tracker.detach_all();

        assert!(sender.is_closed());
        assert!(sender.send(&2).is_err());
    }
}

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

//! Pending invocation tracking.
//!
//! The registry correlates completions and stream items with the calls that
//! are waiting for them. Invocations resolve through a oneshot channel;
//! streams deliver through one unbounded channel per subscriber so clones of
//! a stream can come and go independently.
//!
//! Results are bound to the caller's expected type here, at delivery time,
//! so a mismatch fails only the affected call.

use crate::HubError;
use crate::protocol::{CompletionOutcome, ParameterType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "observability")]
use tracing::debug;

/// Receives the outcome of an invocation.
pub type InvocationReceiver = oneshot::Receiver<Result<Value, HubError>>;

/// Receives the items of a stream. The channel closes when the stream ends;
/// an error is always the last element.
pub type StreamReceiver = mpsc::UnboundedReceiver<Result<Value, HubError>>;

type StreamSender = mpsc::UnboundedSender<Result<Value, HubError>>;

enum Sink {
    Invocation(oneshot::Sender<Result<Value, HubError>>),
    Stream(Vec<StreamSender>),
}

struct PendingInvocation {
    expected: ParameterType,
    sink: Sink,
}

impl PendingInvocation {
    fn bind(&self, id: &str, value: Value) -> Result<Value, HubError> {
        self.expected
            .check(&value)
            .map(|()| value)
            .map_err(|e| HubError::InvalidResult {
                reason: format!(
                    "Error binding result of invocation '{}' as {}: {}",
                    id,
                    self.expected.name(),
                    e
                ),
            })
    }

    fn fail(self, error: HubError) {
        match self.sink {
            Sink::Invocation(sender) => {
                let _ = sender.send(Err(error));
            }
            Sink::Stream(senders) => {
                for sender in senders {
                    let _ = sender.send(Err(error.clone()));
                }
            }
        }
    }
}

/// Tracks in-flight invocations and streams by invocation id.
///
/// # Examples
///
/// ```rust
/// use hubrpc::connection::InvocationRegistry;
/// use hubrpc::protocol::{CompletionOutcome, ParameterType};
/// use serde_json::json;
///
/// # async fn example() {
/// let registry = InvocationRegistry::new();
/// let receiver = registry.register_invocation("1", ParameterType::of::<i32>());
///
/// assert!(registry.complete("1", CompletionOutcome::Result(json!(42))));
/// assert_eq!(receiver.await.unwrap().unwrap(), json!(42));
/// assert!(registry.is_empty());
/// # }
/// ```
#[derive(Default)]
pub struct InvocationRegistry {
    pending: Mutex<HashMap<String, PendingInvocation>>,
}

impl InvocationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingInvocation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an invocation whose result must bind to `expected`.
    pub fn register_invocation(&self, id: &str, expected: ParameterType) -> InvocationReceiver {
        let (sender, receiver) = oneshot::channel();
        self.pending().insert(
            id.to_string(),
            PendingInvocation {
                expected,
                sink: Sink::Invocation(sender),
            },
        );
        receiver
    }

    /// Registers a stream whose items must bind to `expected`.
    pub fn register_stream(&self, id: &str, expected: ParameterType) -> StreamReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.pending().insert(
            id.to_string(),
            PendingInvocation {
                expected,
                sink: Sink::Stream(vec![sender]),
            },
        );
        receiver
    }

    /// Adds a subscriber to a pending stream.
    ///
    /// The subscriber sees only items delivered from now on. Returns `None`
    /// when the stream is no longer pending.
    pub fn subscribe_stream(&self, id: &str) -> Option<StreamReceiver> {
        let mut pending = self.pending();
        let Some(PendingInvocation {
            sink: Sink::Stream(senders),
            ..
        }) = pending.get_mut(id)
        else {
            return None;
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        senders.push(sender);
        Some(receiver)
    }

    /// Resolves the invocation or stream `id` with `outcome`.
    ///
    /// Returns `false` when nothing is pending under `id`.
    pub fn complete(&self, id: &str, outcome: CompletionOutcome) -> bool {
        let Some(entry) = self.pending().remove(id) else {
            #[cfg(feature = "observability")]
            debug!(invocation_id = id, "Dropping completion for unknown invocation");
            return false;
        };

        let outcome = match outcome {
            CompletionOutcome::Empty => Ok(None),
            CompletionOutcome::Result(value) => entry.bind(id, value).map(Some),
            CompletionOutcome::Error(message) => Err(HubError::Invocation { message }),
        };

        match (entry.sink, outcome) {
            (Sink::Invocation(sender), outcome) => {
                let _ = sender.send(outcome.map(|value| value.unwrap_or(Value::Null)));
            }
            (Sink::Stream(senders), Ok(final_item)) => {
                if let Some(item) = final_item {
                    for sender in &senders {
                        let _ = sender.send(Ok(item.clone()));
                    }
                }
            }
            (Sink::Stream(senders), Err(error)) => {
                for sender in &senders {
                    let _ = sender.send(Err(error.clone()));
                }
            }
        }
        true
    }

    /// Delivers a stream item to every subscriber of stream `id`.
    ///
    /// Returns `false` when no stream is pending under `id`. An item that
    /// does not bind ends the stream with an error.
    pub fn next_stream_item(&self, id: &str, item: Value) -> bool {
        let mut pending = self.pending();
        let Some(entry) = pending.get_mut(id) else {
            #[cfg(feature = "observability")]
            debug!(invocation_id = id, "Dropping stream item for unknown stream");
            return false;
        };

        let item = match entry.bind(id, item) {
            Ok(item) => item,
            Err(error) => {
                if let Some(entry) = pending.remove(id) {
                    entry.fail(error);
                }
                return true;
            }
        };

        match &mut entry.sink {
            Sink::Stream(senders) => {
                senders.retain(|sender| sender.send(Ok(item.clone())).is_ok());
                true
            }
            Sink::Invocation(_) => {
                #[cfg(feature = "observability")]
                debug!(invocation_id = id, "Dropping stream item for non-streaming invocation");
                false
            }
        }
    }

    /// Forgets `id` without resolving it. Returns `true` if it was pending.
    pub fn remove(&self, id: &str) -> bool {
        self.pending().remove(id).is_some()
    }

    /// Returns `true` if `id` is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.pending().contains_key(id)
    }

    /// Fails every pending invocation and stream with `error`.
    pub fn cancel_all(&self, error: HubError) {
        let drained: Vec<_> = self.pending().drain().collect();

        #[cfg(feature = "observability")]
        if !drained.is_empty() {
            debug!(count = drained.len(), %error, "Failing pending invocations");
        }

        for (_, entry) in drained {
            entry.fail(error.clone());
        }
    }

    /// Number of pending invocations and streams.
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_complete() {
        let registry = InvocationRegistry::new();
        let receiver = registry.register_invocation("1", ParameterType::any());
        assert_eq!(registry.len(), 1);

        assert!(registry.complete("1", CompletionOutcome::Result(json!("ok"))));
        assert_eq!(receiver.await.unwrap().unwrap(), json!("ok"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_empty_completion_resolves_to_null() {
        let registry = InvocationRegistry::new();
        let receiver = registry.register_invocation("1", ParameterType::of::<()>());
        assert!(registry.complete("1", CompletionOutcome::Empty));
        assert_eq!(receiver.await.unwrap().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_error_completion() {
        let registry = InvocationRegistry::new();
        let receiver = registry.register_invocation("7", ParameterType::any());
        registry.complete("7", CompletionOutcome::Error("boom".into()));
        match receiver.await.unwrap() {
            Err(HubError::Invocation { message }) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_result_binding_failure() {
        let registry = InvocationRegistry::new();
        let receiver = registry.register_invocation("1", ParameterType::of::<i32>());
        registry.complete("1", CompletionOutcome::Result(json!("text")));
        assert!(matches!(
            receiver.await.unwrap(),
            Err(HubError::InvalidResult { .. })
        ));
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let registry = InvocationRegistry::new();
        assert!(!registry.complete("99", CompletionOutcome::Empty));
        assert!(!registry.next_stream_item("99", json!(1)));
        assert!(!registry.remove("99"));
    }

    #[tokio::test]
    async fn test_stream_items_then_final_result() {
        let registry = InvocationRegistry::new();
        let mut receiver = registry.register_stream("3", ParameterType::of::<i32>());

        assert!(registry.next_stream_item("3", json!(1)));
        assert!(registry.next_stream_item("3", json!(2)));
        assert!(registry.complete("3", CompletionOutcome::Result(json!(3))));

        assert_eq!(receiver.recv().await.unwrap().unwrap(), json!(1));
        assert_eq!(receiver.recv().await.unwrap().unwrap(), json!(2));
        assert_eq!(receiver.recv().await.unwrap().unwrap(), json!(3));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_later_items() {
        let registry = InvocationRegistry::new();
        let mut first = registry.register_stream("1", ParameterType::any());
        registry.next_stream_item("1", json!("a"));

        let mut second = registry.subscribe_stream("1").unwrap();
        registry.next_stream_item("1", json!("b"));
        registry.complete("1", CompletionOutcome::Empty);

        assert_eq!(first.recv().await.unwrap().unwrap(), json!("a"));
        assert_eq!(first.recv().await.unwrap().unwrap(), json!("b"));
        assert!(first.recv().await.is_none());

        assert_eq!(second.recv().await.unwrap().unwrap(), json!("b"));
        assert!(second.recv().await.is_none());

        assert!(registry.subscribe_stream("1").is_none());
    }

    #[tokio::test]
    async fn test_stream_item_binding_failure_ends_stream() {
        let registry = InvocationRegistry::new();
        let mut receiver = registry.register_stream("1", ParameterType::of::<u8>());
        registry.next_stream_item("1", json!(1000));

        assert!(matches!(
            receiver.recv().await.unwrap(),
            Err(HubError::InvalidResult { .. })
        ));
        assert!(receiver.recv().await.is_none());
        assert!(!registry.contains("1"));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let registry = InvocationRegistry::new();
        let invocation = registry.register_invocation("1", ParameterType::any());
        let mut stream = registry.register_stream("2", ParameterType::any());

        registry.cancel_all(HubError::Canceled);

        assert!(invocation.await.unwrap().unwrap_err().is_canceled());
        assert!(stream.recv().await.unwrap().unwrap_err().is_canceled());
        assert!(stream.recv().await.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_drops_sink() {
        let registry = InvocationRegistry::new();
        let receiver = registry.register_invocation("1", ParameterType::any());
        assert!(registry.remove("1"));
        assert!(receiver.await.is_err());
    }
}

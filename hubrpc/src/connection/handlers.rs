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

//! Client-side handlers for server invocations.
//!
//! Handlers are registered per target and run in registration order. The
//! first handler registered for a target decides how inbound arguments are
//! bound; at most one handler per target may return a result.

use crate::HubError;
use crate::protocol::{InvocationBinder, ParameterType};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Error returned by a failing handler. Its message is sent to the server
/// when the handler was expected to return a result.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type HandlerFuture = BoxFuture<'static, Result<Option<Value>, HandlerError>>;
pub(crate) type HandlerCallback = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Arguments a typed handler accepts.
///
/// Implemented for `()` and for tuples of up to six deserializable types.
///
/// # Examples
///
/// ```rust
/// use hubrpc::connection::HubArguments;
/// use serde_json::json;
///
/// let (name, count) = <(String, u32)>::from_values(vec![json!("a"), json!(2)]).unwrap();
/// assert_eq!(name, "a");
/// assert_eq!(count, 2);
/// assert_eq!(<(String, u32)>::parameter_types().len(), 2);
/// ```
pub trait HubArguments: Sized + Send + 'static {
    /// Parameter types used to bind inbound arguments.
    fn parameter_types() -> Vec<ParameterType>;

    /// Converts bound argument values into `Self`.
    fn from_values(values: Vec<Value>) -> Result<Self, String>;
}

impl HubArguments for () {
    fn parameter_types() -> Vec<ParameterType> {
        Vec::new()
    }

    fn from_values(values: Vec<Value>) -> Result<Self, String> {
        if values.is_empty() {
            Ok(())
        } else {
            Err(format!("expected no arguments, got {}", values.len()))
        }
    }
}

macro_rules! impl_hub_arguments {
    ($count:expr; $($name:ident),+) => {
        impl<$($name),+> HubArguments for ($($name,)+)
        where
            $($name: DeserializeOwned + Send + 'static),+
        {
            fn parameter_types() -> Vec<ParameterType> {
                vec![$(ParameterType::of::<$name>()),+]
            }

            fn from_values(values: Vec<Value>) -> Result<Self, String> {
                if values.len() != $count {
                    return Err(format!(
                        "expected {} argument(s), got {}",
                        $count,
                        values.len()
                    ));
                }
                let mut values = values.into_iter();
                Ok(($(
                    serde_json::from_value::<$name>(values.next().unwrap_or(Value::Null))
                        .map_err(|e| e.to_string())?,
                )+))
            }
        }
    };
}

impl_hub_arguments!(1; A);
impl_hub_arguments!(2; A, B);
impl_hub_arguments!(3; A, B, C);
impl_hub_arguments!(4; A, B, C, D);
impl_hub_arguments!(5; A, B, C, D, E);
impl_hub_arguments!(6; A, B, C, D, E, F);

#[derive(Clone)]
pub(crate) struct HandlerEntry {
    pub(crate) key: u64,
    pub(crate) parameter_types: Vec<ParameterType>,
    pub(crate) returns_result: bool,
    pub(crate) callback: HandlerCallback,
}

/// Handlers registered on a connection, keyed by target.
#[derive(Default)]
pub(crate) struct HandlerTable {
    targets: Mutex<HashMap<String, Vec<HandlerEntry>>>,
    next_key: AtomicU64,
}

impl HandlerTable {
    fn targets(&self) -> MutexGuard<'_, HashMap<String, Vec<HandlerEntry>>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a handler that does not return a result.
    pub(crate) fn add(
        &self,
        target: &str,
        parameter_types: Vec<ParameterType>,
        callback: HandlerCallback,
    ) -> u64 {
        let mut targets = self.targets();
        self.insert(&mut targets, target, parameter_types, false, callback)
    }

    /// Adds the result-returning handler for `target`.
    pub(crate) fn add_result_handler(
        &self,
        target: &str,
        parameter_types: Vec<ParameterType>,
        callback: HandlerCallback,
    ) -> Result<u64, HubError> {
        let mut targets = self.targets();
        let taken = targets
            .get(target)
            .is_some_and(|handlers| handlers.iter().any(|handler| handler.returns_result));
        if taken {
            return Err(HubError::DuplicateResultHandler {
                target: target.to_string(),
            });
        }
        Ok(self.insert(&mut targets, target, parameter_types, true, callback))
    }

    fn insert(
        &self,
        targets: &mut HashMap<String, Vec<HandlerEntry>>,
        target: &str,
        parameter_types: Vec<ParameterType>,
        returns_result: bool,
        callback: HandlerCallback,
    ) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        targets.entry(target.to_string()).or_default().push(HandlerEntry {
            key,
            parameter_types,
            returns_result,
            callback,
        });
        key
    }

    pub(crate) fn remove_handler(&self, target: &str, key: u64) -> bool {
        let mut targets = self.targets();
        let Some(handlers) = targets.get_mut(target) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|handler| handler.key != key);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            targets.remove(target);
        }
        removed
    }

    pub(crate) fn remove_target(&self, target: &str) -> bool {
        self.targets().remove(target).is_some()
    }

    /// Handlers for `target` in registration order.
    pub(crate) fn handlers(&self, target: &str) -> Vec<HandlerEntry> {
        self.targets().get(target).cloned().unwrap_or_default()
    }
}

impl InvocationBinder for HandlerTable {
    fn parameter_types(&self, target: &str) -> Option<Vec<ParameterType>> {
        self.targets()
            .get(target)
            .and_then(|handlers| handlers.first())
            .map(|handler| handler.parameter_types.clone())
    }
}

/// A registered handler. Dropping the subscription keeps the handler
/// registered; call [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Clone)]
pub struct Subscription {
    table: Weak<HandlerTable>,
    target: String,
    key: u64,
}

impl Subscription {
    pub(crate) fn new(table: &Arc<HandlerTable>, target: &str, key: u64) -> Self {
        Self {
            table: Arc::downgrade(table),
            target: target.to_string(),
            key,
        }
    }

    /// The target this handler is registered for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Removes this handler, leaving other handlers for the target in place.
    pub fn unsubscribe(&self) {
        if let Some(table) = self.table.upgrade() {
            table.remove_handler(&self.target, self.key);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.target)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;

    fn noop() -> HandlerCallback {
        Arc::new(|_args: Vec<Value>| async { Ok::<_, HandlerError>(None) }.boxed())
    }

    #[test]
    fn test_tuple_arguments() {
        let (a, b, c) =
            <(i32, String, bool)>::from_values(vec![json!(1), json!("x"), json!(true)]).unwrap();
        assert_eq!((a, b.as_str(), c), (1, "x", true));

        assert!(<(i32,)>::from_values(vec![json!("x")]).is_err());
        assert!(<(i32,)>::from_values(vec![]).is_err());
        assert!(<()>::from_values(vec![json!(1)]).is_err());
        assert_eq!(<(u8, u8, u8, u8, u8, u8)>::parameter_types().len(), 6);
    }

    #[test]
    fn test_first_handler_decides_binding() {
        let table = HandlerTable::default();
        table.add("t", vec![ParameterType::of::<i32>()], noop());
        table.add("t", vec![], noop());

        assert_eq!(table.parameter_types("t").unwrap().len(), 1);
        assert!(table.parameter_types("other").is_none());
    }

    #[test]
    fn test_single_result_handler_per_target() {
        let table = HandlerTable::default();
        table.add_result_handler("t", vec![], noop()).unwrap();
        table.add("t", vec![], noop());
        let err = table.add_result_handler("t", vec![], noop()).unwrap_err();
        assert!(matches!(err, HubError::DuplicateResultHandler { .. }));
        assert_eq!(table.handlers("t").len(), 2);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let table = Arc::new(HandlerTable::default());
        let first = table.add("t", vec![], noop());
        let second = table.add("t", vec![], noop());

        Subscription::new(&table, "t", first).unsubscribe();
        let remaining = table.handlers("t");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, second);

        Subscription::new(&table, "t", second).unsubscribe();
        assert!(table.handlers("t").is_empty());
        assert!(!table.remove_target("t"));
    }
}

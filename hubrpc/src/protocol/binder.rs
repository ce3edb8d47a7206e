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

//! Argument binding for inbound invocations.
//!
//! The decoder asks an [`InvocationBinder`] for the parameter types of each
//! inbound target and checks the decoded arguments against them. A mismatch
//! becomes an in-band
//! [`InvocationBindingFailure`](crate::protocol::InvocationBindingFailure)
//! rather than a decode error.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Check = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// The expected type of one positional argument or result.
///
/// A parameter type is a named check that a decoded value can be
/// deserialized into the target Rust type.
///
/// # Examples
///
/// ```rust
/// use hubrpc::protocol::ParameterType;
/// use serde_json::json;
///
/// let int = ParameterType::of::<i32>();
/// assert!(int.check(&json!(42)).is_ok());
/// assert!(int.check(&json!("forty-two")).is_err());
///
/// assert!(ParameterType::any().check(&json!({"a": 1})).is_ok());
/// ```
#[derive(Clone)]
pub struct ParameterType {
    name: &'static str,
    check: Check,
}

impl ParameterType {
    /// A parameter that must deserialize into `T`.
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + 'static,
    {
        Self {
            name: std::any::type_name::<T>(),
            check: Arc::new(|value: &Value| {
                T::deserialize(value).map(|_| ()).map_err(|e| e.to_string())
            }),
        }
    }

    /// A parameter that accepts any value.
    pub fn any() -> Self {
        Self {
            name: "any",
            check: Arc::new(|_| Ok(())),
        }
    }

    /// Name of the expected type, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks that `value` binds to this type.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParameterType").field(&self.name).finish()
    }
}

/// Resolves the parameter types of inbound invocation targets.
pub trait InvocationBinder: Send + Sync {
    /// Returns the parameter types of `target`, or `None` when nothing is
    /// registered for it. Arguments of unknown targets are not checked.
    fn parameter_types(&self, target: &str) -> Option<Vec<ParameterType>>;
}

/// A binder that knows no targets and therefore never rejects arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBinder;

impl InvocationBinder for NoBinder {
    fn parameter_types(&self, _target: &str) -> Option<Vec<ParameterType>> {
        None
    }
}

impl InvocationBinder for HashMap<String, Vec<ParameterType>> {
    fn parameter_types(&self, target: &str) -> Option<Vec<ParameterType>> {
        self.get(target).cloned()
    }
}

/// Checks decoded `arguments` for `target` against the binder.
///
/// Returns the binding error message on failure.
pub(crate) fn bind_arguments(
    binder: &dyn InvocationBinder,
    target: &str,
    arguments: &[Value],
) -> Result<(), String> {
    let Some(types) = binder.parameter_types(target) else {
        return Ok(());
    };

    if types.len() != arguments.len() {
        return Err(format!(
            "Invocation provides {} argument(s) but target expects {}.",
            arguments.len(),
            types.len()
        ));
    }

    for (index, (parameter, argument)) in types.iter().zip(arguments).enumerate() {
        parameter.check(argument).map_err(|e| {
            format!(
                "Error binding argument {} of '{}' as {}: {}",
                index,
                target,
                parameter.name(),
                e
            )
        })?;
    }

    Ok(())
}

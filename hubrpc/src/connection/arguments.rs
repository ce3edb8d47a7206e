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

//! Call arguments.

use crate::HubError;
use crate::connection::UploadStream;
use serde::Serialize;
use serde_json::Value;

/// Arguments of an outbound call: serialized values plus upload streams.
///
/// Serialization errors are kept and reported by the call that consumes the
/// arguments, so arguments can be built fluently.
///
/// # Examples
///
/// ```rust
/// use hubrpc::connection::Arguments;
///
/// let arguments = Arguments::new().arg("alice").arg(&42);
/// assert_eq!(arguments.len(), 2);
///
/// let from_tuple: Arguments = ("alice", 42).into();
/// assert_eq!(from_tuple.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Value>,
    streams: Vec<UploadStream>,
    error: Option<HubError>,
}

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a serialized argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_none() {
            match serde_json::to_value(value) {
                Ok(value) => self.values.push(value),
                Err(e) => {
                    self.error = Some(HubError::Serialization {
                        reason: e.to_string(),
                    })
                }
            }
        }
        self
    }

    /// Appends an already serialized argument.
    pub fn value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    /// Appends an upload stream. Streams are announced in `streamIds` rather
    /// than in the argument list.
    pub fn stream(mut self, stream: UploadStream) -> Self {
        self.streams.push(stream);
        self
    }

    /// Number of value arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when there are neither values nor streams.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.streams.is_empty()
    }

    pub(crate) fn into_parts(self) -> Result<(Vec<Value>, Vec<UploadStream>), HubError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.values, self.streams)),
        }
    }
}

impl From<()> for Arguments {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }
}

macro_rules! impl_from_tuple {
    ($($name:ident $value:ident),+) => {
        impl<$($name),+> From<($($name,)+)> for Arguments
        where
            $($name: Serialize),+
        {
            fn from(($($value,)+): ($($name,)+)) -> Self {
                Self::new()$(.arg(&$value))+
            }
        }
    };
}

impl_from_tuple!(A a);
impl_from_tuple!(A a, B b);
impl_from_tuple!(A a, B b, C c);
impl_from_tuple!(A a, B b, C c, D d);
impl_from_tuple!(A a, B b, C c, D d, E e);
impl_from_tuple!(A a, B b, C c, D d, E e, F f);

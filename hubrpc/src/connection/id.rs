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

//! Invocation id generation.
//!
//! One counter per connection hands out ids for invocations, streams and
//! upload streams alike, so an id is never reused while the connection lives.

use std::sync::atomic::{AtomicU64, Ordering};

/// Generates invocation ids, starting at `"1"`.
#[derive(Debug)]
pub struct InvocationIdGenerator {
    next_id: AtomicU64,
}

impl InvocationIdGenerator {
    /// Creates a generator whose first id is `"1"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the next id as a decimal string.
    #[must_use]
    pub fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Returns the id the next call to [`next_id`](Self::next_id) will hand out.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for InvocationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

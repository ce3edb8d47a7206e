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

//! Access-token sources.
//!
//! The provider is asked for a token on every negotiate request and whenever
//! a transport needs one, so rotating tokens are picked up without
//! reconnecting. An empty token means "send no `Authorization` header".

use crate::HubError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Supplies bearer tokens for negotiate requests and transports.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns the current token. An empty string disables authorization.
    async fn access_token(&self) -> Result<String, HubError>;
}

/// A provider that always returns the same token.
///
/// # Examples
///
/// ```rust
/// use hubrpc::auth::{AccessTokenProvider, StaticAccessToken};
///
/// # async fn example() -> Result<(), hubrpc::HubError> {
/// let provider = StaticAccessToken::new("secret");
/// assert_eq!(provider.access_token().await?, "secret");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    /// Creates a provider for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticAccessToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<String, HubError> {
        Ok(self.0.clone())
    }
}

/// A provider backed by an async closure.
///
/// # Examples
///
/// ```rust
/// use hubrpc::auth::{AccessTokenFn, AccessTokenProvider};
///
/// # async fn example() -> Result<(), hubrpc::HubError> {
/// let provider = AccessTokenFn::new(|| async { Ok("fresh".to_string()) });
/// assert_eq!(provider.access_token().await?, "fresh");
/// # Ok(())
/// # }
/// ```
pub struct AccessTokenFn<F> {
    factory: F,
}

impl<F, Fut> AccessTokenFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, HubError>> + Send,
{
    /// Wraps `factory`.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> fmt::Debug for AccessTokenFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> AccessTokenProvider for AccessTokenFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, HubError>> + Send,
{
    async fn access_token(&self) -> Result<String, HubError> {
        (self.factory)().await
    }
}

/// Shared handle to a token provider.
pub type SharedAccessTokenProvider = Arc<dyn AccessTokenProvider>;

/// Fetches a token from an optional provider, mapping "no provider" and the
/// empty token to `None`.
pub(crate) async fn fetch_token(
    provider: Option<&SharedAccessTokenProvider>,
) -> Result<Option<String>, HubError> {
    let Some(provider) = provider else {
        return Ok(None);
    };
    let token = provider.access_token().await?;
    Ok(if token.is_empty() { None } else { Some(token) })
}

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

//! reqwest-backed [`HttpClient`].

use crate::http::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;

#[cfg(feature = "observability")]
use tracing::debug;

/// An [`HttpClient`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Creates a client with reqwest's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Request {
                method: HttpMethod::Get,
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let failed = |reason: String| HttpError::Request {
            method,
            url: url.clone(),
            reason,
        };

        let mut builder = self.client.request(method.into(), url.as_str());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        #[cfg(feature = "observability")]
        debug!("{} {}", method, url);

        let response = builder.send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

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

//! The HTTP collaborator used for negotiation.
//!
//! The connection engine only needs to POST a negotiate request and read the
//! response body. [`HttpClient`] captures exactly that, so tests can script
//! responses and applications can plug in their own stack. A
//! [reqwest](https://docs.rs/reqwest)-backed client is available behind the
//! `reqwest` feature (enabled by default).

#[cfg(feature = "reqwest")]
mod reqwest_client;

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestHttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// HTTP request methods used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Creates a bodiless POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Adds a header, replacing an existing one of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, "OK", body)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors raised by an [`HttpClient`].
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The request could not be sent or the response could not be read.
    #[error("{method} {url} failed: {reason}")]
    Request {
        /// Request method.
        method: HttpMethod,
        /// Request URL.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The request URL is not a valid absolute URL.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Sends HTTP requests on behalf of the negotiation client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::post("http://example.com/negotiate")
            .with_header("A", "1")
            .with_header("A", "2");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers.get("A").map(String::as_str), Some("2"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::ok("{}").is_success());
        assert!(HttpResponse::new(204, "No Content", "").is_success());
        assert!(!HttpResponse::new(404, "Not Found", "").is_success());
    }
}

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

//! The negotiate exchange.

use crate::HubError;
use crate::auth::{SharedAccessTokenProvider, fetch_token};
use crate::http::{HttpClient, HttpError, HttpRequest};
use crate::negotiate::NegotiateResponse;
use crate::protocol::TransferFormat;
use crate::transport::{TransportKind, TransportPreference};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Number of redirects followed before negotiation gives up.
pub const MAX_NEGOTIATE_REDIRECTS: usize = 100;

/// Header carrying the client's user agent on negotiate requests.
pub const USER_AGENT_HEADER: &str = "X-Hub-User-Agent";

/// Negotiate protocol version requested by this client.
pub const NEGOTIATE_VERSION: u32 = 1;

/// The user agent string sent with negotiate requests and to transports.
pub fn user_agent() -> String {
    format!("hubrpc/{}", env!("CARGO_PKG_VERSION"))
}

/// Where and how to open the transport, as decided by negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// The transport to create.
    pub transport: TransportKind,
    /// The transport URL, including the `id` query parameter.
    pub url: String,
    /// Public connection id.
    pub connection_id: Option<String>,
    /// Private connection token.
    pub connection_token: Option<String>,
    /// Token handed out by a redirect, replacing the configured provider.
    pub access_token: Option<String>,
}

/// Performs the HTTP negotiate exchange.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use hubrpc::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
/// use hubrpc::negotiate::NegotiationClient;
/// use hubrpc::protocol::TransferFormat;
/// use hubrpc::transport::{TransportKind, TransportPreference};
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// struct Fixed;
///
/// #[async_trait]
/// impl HttpClient for Fixed {
///     async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
///         Ok(HttpResponse::ok(
///             r#"{"connectionId":"c","connectionToken":"t","negotiateVersion":1,
///                "availableTransports":[{"transport":"WebSockets","transferFormats":["Text"]}]}"#,
///         ))
///     }
/// }
///
/// # async fn example() -> Result<(), hubrpc::HubError> {
/// let client = NegotiationClient::new(Arc::new(Fixed), BTreeMap::new());
/// let endpoint = client
///     .negotiate("http://example.com/hub", None, TransportPreference::Any, TransferFormat::Text)
///     .await?;
/// assert_eq!(endpoint.transport, TransportKind::WebSockets);
/// assert_eq!(endpoint.url, "http://example.com/hub?id=t");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NegotiationClient {
    http: Arc<dyn HttpClient>,
    headers: BTreeMap<String, String>,
}

impl NegotiationClient {
    /// Creates a client that sends `headers` with every negotiate request.
    pub fn new(http: Arc<dyn HttpClient>, headers: BTreeMap<String, String>) -> Self {
        Self { http, headers }
    }

    /// Negotiates against `base_url`, following redirects, and selects a
    /// transport.
    ///
    /// The token provider is consulted on every request. A redirect that
    /// carries an access token replaces the provider for the rest of this
    /// negotiation.
    ///
    /// # Errors
    ///
    /// Fails on HTTP errors, non-success statuses, server-reported errors,
    /// legacy servers, too many redirects and when no offered transport
    /// matches `preference` and `format`.
    #[cfg_attr(
        feature = "observability",
        tracing::instrument(skip(self, token_provider), fields(base_url = %base_url))
    )]
    pub async fn negotiate(
        &self,
        base_url: &str,
        token_provider: Option<SharedAccessTokenProvider>,
        preference: TransportPreference,
        format: TransferFormat,
    ) -> Result<ResolvedEndpoint, HubError> {
        let mut url = base_url.to_string();
        let mut redirect_token: Option<String> = None;
        let mut redirects = 0;

        loop {
            let token = match &redirect_token {
                Some(token) if token.is_empty() => None,
                Some(token) => Some(token.clone()),
                None => fetch_token(token_provider.as_ref()).await?,
            };

            let response = self.send_negotiate(&url, token.as_deref()).await?;

            if let Some(error) = response.error {
                #[cfg(feature = "observability")]
                warn!(%error, "Negotiate rejected by server");
                return Err(HubError::NegotiateRejected { message: error });
            }

            if let Some(redirect) = response.url {
                if redirects >= MAX_NEGOTIATE_REDIRECTS {
                    return Err(HubError::RedirectLimitExceeded);
                }
                redirects += 1;

                #[cfg(feature = "observability")]
                debug!(redirect = %redirect, redirects, "Following negotiate redirect");

                url = redirect;
                if let Some(access_token) = response.access_token {
                    redirect_token = Some(access_token);
                }
                continue;
            }

            let transport = select_transport(&response, preference, format)
                .ok_or(HubError::NoCompatibleTransport)?;

            let id = if response.negotiate_version >= 1 {
                response.connection_token.as_deref()
            } else {
                response.connection_id.as_deref()
            };
            let transport_url = match id {
                Some(id) => append_query(&url, "id", id)?,
                None => url.clone(),
            };

            #[cfg(feature = "observability")]
            info!(%transport, url = %transport_url, "Negotiated transport");

            return Ok(ResolvedEndpoint {
                transport,
                url: transport_url,
                connection_id: response.connection_id,
                connection_token: response.connection_token,
                access_token: redirect_token,
            });
        }
    }

    async fn send_negotiate(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<NegotiateResponse, HubError> {
        let negotiate_url = negotiate_url(url)?;

        let mut request = HttpRequest::post(negotiate_url);
        for (name, value) in &self.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        request = request.with_header(USER_AGENT_HEADER, user_agent());
        if let Some(token) = token {
            request = request.with_header("Authorization", format!("Bearer {}", token));
        }

        #[cfg(feature = "observability")]
        debug!(url = %request.url, "Sending negotiate request");

        let response = self.http.send(request).await?;
        if !response.is_success() {
            return Err(HubError::NegotiateStatus {
                status: response.status,
                reason: response.status_text,
            });
        }

        NegotiateResponse::parse(&response.body)
    }
}

/// Resolves the endpoint when negotiation is skipped.
///
/// Only a direct WebSockets connection can skip negotiation; the base URL is
/// used as the transport URL unchanged.
pub fn skip_negotiation(
    base_url: &str,
    preference: TransportPreference,
) -> Result<ResolvedEndpoint, HubError> {
    if preference != TransportPreference::Only(TransportKind::WebSockets) {
        return Err(HubError::SkipNegotiationUnsupported);
    }
    Ok(ResolvedEndpoint {
        transport: TransportKind::WebSockets,
        url: base_url.to_string(),
        connection_id: None,
        connection_token: None,
        access_token: None,
    })
}

/// Picks the transport to open from the offered set.
///
/// Candidates must be allowed by the preference and carry `format`. Among
/// them the client ranks WebSockets first, then server-sent events, then
/// long polling, whatever order the server lists them in.
pub fn select_transport(
    response: &NegotiateResponse,
    preference: TransportPreference,
    format: TransferFormat,
) -> Option<TransportKind> {
    response
        .available_transports
        .iter()
        .filter_map(|offered| {
            let kind = match offered.transport.parse::<TransportKind>() {
                Ok(kind) => kind,
                Err(_reason) => {
                    #[cfg(feature = "observability")]
                    debug!(reason = %_reason, "Skipping unknown transport");
                    return None;
                }
            };
            let carries_format = offered
                .transfer_formats
                .iter()
                .any(|offered| offered == format.as_str());
            (preference.allows(kind) && kind.supports(format) && carries_format).then_some(kind)
        })
        .min_by_key(|kind| kind.rank())
}

fn parse_url(url: &str) -> Result<Url, HubError> {
    Url::parse(url).map_err(|e| {
        HubError::Http(HttpError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Builds `{url}/negotiate?negotiateVersion=1`, keeping any existing query.
pub fn negotiate_url(url: &str) -> Result<String, HubError> {
    let mut parsed = parse_url(url)?;
    parsed
        .path_segments_mut()
        .map_err(|()| {
            HubError::Http(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "URL can not be a base".to_string(),
            })
        })?
        .pop_if_empty()
        .push("negotiate");

    let has_version = parsed.query_pairs().any(|(key, _)| key == "negotiateVersion");
    if !has_version {
        parsed
            .query_pairs_mut()
            .append_pair("negotiateVersion", &NEGOTIATE_VERSION.to_string());
    }
    Ok(parsed.into())
}

/// Appends `key=value` to the query of `url`.
pub fn append_query(url: &str, key: &str, value: &str) -> Result<String, HubError> {
    let mut parsed = parse_url(url)?;
    parsed.query_pairs_mut().append_pair(key, value);
    Ok(parsed.into())
}

// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The authenticated upstream gateway.
//!
//! A [Gateway] supplies a valid bearer token to every outbound request. The
//! token is obtained with a login call, cached in memory, and refreshed
//! transparently when it is absent, expired, or rejected by the upstream.
//!
//! ```no_run
//! # use akada_gateway::gateway::{Gateway, RequestOptions};
//! # async fn sample() -> akada_gateway::Result<()> {
//! let gateway = Gateway::from_env()?;
//! let response = gateway
//!     .request("/studio/students", RequestOptions::get().with_query("page", "1"))
//!     .await?;
//! println!("{} {}", response.status(), response.text());
//! # Ok(()) }
//! ```

use crate::Result;
use crate::errors::{ErrorKind, GatewayError};
use crate::headers::{api_key_header, build_auth_headers};
use crate::login::LoginProvider;
use crate::options::GatewayConfig;
use crate::token::Token;
use crate::token_cache::TokenCache;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;

/// Issues authenticated requests against the upstream API.
///
/// Construct one gateway per process and share it: clones are cheap and
/// share the token cache, so concurrent callers never trigger redundant
/// logins.
#[derive(Clone, Debug)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    api_key: HeaderValue,
    request_timeout: Duration,
    cache: TokenCache<LoginProvider>,
}

impl Gateway {
    /// Returns a builder for a gateway using `config`.
    pub fn builder(config: GatewayConfig) -> Builder {
        Builder::new(config)
    }

    /// Creates a gateway configured from the `AKADA_*` environment variables.
    ///
    /// See [options][crate::options] for the list of variables.
    pub fn from_env() -> Result<Self> {
        Builder::new(GatewayConfig::from_env()?).build()
    }

    /// Returns a valid token, logging in if needed.
    ///
    /// The cached token is returned while it is outside the refresh margin.
    /// Otherwise this call starts a login, or joins the login already in
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [UpstreamAuth][ErrorKind::UpstreamAuth] if the
    /// login call fails.
    pub async fn token(&self) -> Result<Token> {
        self.cache.token().await
    }

    /// Discards the cached token, the next call logs in again.
    pub async fn clear_token(&self) {
        self.cache.invalidate().await
    }

    /// Issues a request to `{base_url}{path}` with the credentials attached.
    ///
    /// The response is returned as-is, whatever its status code. The only
    /// exception is `401 Unauthorized` on the first attempt: the gateway
    /// refreshes the token, bypassing the cache, and retries exactly once. A
    /// second `401` is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [UpstreamAuth][ErrorKind::UpstreamAuth] if a
    /// token cannot be obtained, and of kind
    /// [UpstreamRequest][ErrorKind::UpstreamRequest] if the request fails or
    /// times out before a response is received.
    #[tracing::instrument(level = "debug", skip_all, fields(method = %options.method, path = %path))]
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Response> {
        let token = self.cache.token().await?;
        let response = self.attempt(path, &options, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("the upstream rejected the token, refreshing it and retrying once");
        let token = self.cache.refresh(&token).await?;
        self.attempt(path, &options, &token).await
    }

    /// Issues a `GET` request to `{base_url}{path}`.
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(path, RequestOptions::get()).await
    }

    /// Issues a `GET` request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// In addition to the errors from [request][Gateway::request], responses
    /// with a non-success status are returned as errors of kind
    /// [UpstreamRequest][ErrorKind::UpstreamRequest], and bodies that cannot be
    /// decoded as errors of kind [Deserialize][ErrorKind::Deserialize].
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.error_for_status()?.json()
    }

    fn url(&self, path: &str) -> String {
        match path.starts_with('/') {
            true => format!("{}{path}", self.base_url),
            false => format!("{}/{path}", self.base_url),
        }
    }

    async fn attempt(&self, path: &str, options: &RequestOptions, token: &Token) -> Result<Response> {
        let mut builder = self
            .client
            .request(options.method.clone(), self.url(path))
            .headers(options.headers.clone())
            // The credentials replace any headers with the same names.
            .headers(build_auth_headers(&self.api_key, token)?)
            .timeout(options.timeout.unwrap_or(self.request_timeout));
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::transport(ErrorKind::UpstreamRequest, e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::transport(ErrorKind::UpstreamRequest, e))?;
        tracing::debug!(%status, "upstream responded");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// A builder for [Gateway].
pub struct Builder {
    config: GatewayConfig,
    client: Option<reqwest::Client>,
}

impl Builder {
    fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// Uses `client` for the login and the proxied calls.
    ///
    /// Timeouts configured in [GatewayConfig] are applied per request and
    /// take precedence over any timeout configured in `client`.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Creates the gateway. No network calls are made until the first token
    /// is needed.
    pub fn build(self) -> Result<Gateway> {
        let client = self.client.unwrap_or_default();
        let api_key = api_key_header(self.config.api_key())?;
        let provider = LoginProvider::new(client.clone(), &self.config, api_key.clone());
        Ok(Gateway {
            client,
            base_url: self.config.base_url().to_string(),
            api_key,
            request_timeout: self.config.request_timeout(),
            cache: TokenCache::new(provider, self.config.refresh_margin()),
        })
    }
}

/// Per-request settings for [Gateway::request].
///
/// The body is held in memory, so it can be sent again when the request is
/// retried after a `401`.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    /// Creates options for a request with the given `method`.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Creates options for a `GET` request.
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Creates options for a `POST` request.
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// The HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Adds a header to the request.
    ///
    /// The `AkadaApiKey` and `Authorization` headers are always set by the
    /// gateway, values set here for them are ignored.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Adds a query parameter to the request.
    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a JSON body and the matching `content-type` header.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body.to_string()));
        self
    }

    /// Sets a raw body.
    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the configured request timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully received upstream response.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// The status code returned by the upstream.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if the status is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            GatewayError::http(
                ErrorKind::Deserialize,
                self.status,
                self.text(),
                format!("cannot decode the response body: {e}"),
            )
        })
    }

    /// Returns an error of kind [UpstreamRequest][ErrorKind::UpstreamRequest]
    /// if the status is not a success.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(GatewayError::http(
            ErrorKind::UpstreamRequest,
            self.status,
            self.text(),
            "the upstream returned an error status",
        ))
    }
}

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

//! Obtains tokens from the upstream login endpoint.

use crate::Result;
use crate::errors::{ErrorKind, GatewayError};
use crate::headers::{api_key_name, bearer_header};
use crate::options::GatewayConfig;
use crate::token::{Token, TokenProvider};
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use std::time::Duration;
use tokio::time::Instant;

pub(crate) const LOGIN_PATH: &str = "/studio/auth/user-token";

/// Performs one login per call.
///
/// The upstream does not declare an expiry in the login response, tokens
/// expire `token_ttl` after they are received.
pub(crate) struct LoginProvider {
    client: Client,
    endpoint: String,
    api_key: HeaderValue,
    username: String,
    password: String,
    inactivity_expiration_hours: u32,
    token_ttl: Duration,
    timeout: Duration,
}

impl LoginProvider {
    pub(crate) fn new(client: Client, config: &GatewayConfig, api_key: HeaderValue) -> Self {
        Self {
            client,
            endpoint: format!("{}{LOGIN_PATH}", config.base_url()),
            api_key,
            username: config.username().to_string(),
            password: config.password().to_string(),
            inactivity_expiration_hours: config.inactivity_expiration_hours(),
            token_ttl: config.token_ttl(),
            timeout: config.login_timeout(),
        }
    }
}

impl std::fmt::Debug for LoginProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[censored]")
            .field("username", &self.username)
            .field("password", &"[censored]")
            .field(
                "inactivity_expiration_hours",
                &self.inactivity_expiration_hours,
            )
            .field("token_ttl", &self.token_ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for LoginProvider {
    async fn token(&self) -> Result<Token> {
        let req = LoginRequest {
            username: &self.username,
            password: &self.password,
            inactivity_expiration_time_hours: self.inactivity_expiration_hours,
        };
        let header = HeaderValue::from_static("application/json");
        let builder = self
            .client
            .request(Method::POST, self.endpoint.as_str())
            .header(api_key_name(), self.api_key.clone())
            .header(CONTENT_TYPE, header)
            .timeout(self.timeout)
            .json(&req);
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::transport(ErrorKind::UpstreamAuth, e))?;

        // Process the response
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::transport(ErrorKind::UpstreamAuth, e))?;
        if !status.is_success() {
            return Err(GatewayError::http(
                ErrorKind::UpstreamAuth,
                status,
                body,
                "the login request was rejected",
            ));
        }
        let response = match serde_json::from_str::<LoginResponse>(&body) {
            Ok(r) => r,
            Err(e) => {
                return Err(GatewayError::http(
                    ErrorKind::UpstreamAuth,
                    status,
                    body,
                    format!("cannot parse the login response: {e}"),
                ));
            }
        };
        let Some(token) = response.return_value.filter(|t| !t.is_empty()) else {
            return Err(GatewayError::http(
                ErrorKind::UpstreamAuth,
                status,
                body,
                "the login response has no `returnValue` token",
            ));
        };
        let token = Token {
            token,
            expires_at: Some(Instant::now() + self.token_ttl),
        };
        // A token that cannot be sent must not reach the cache.
        if bearer_header(&token).is_err() {
            return Err(GatewayError::http(
                ErrorKind::UpstreamAuth,
                status,
                body,
                "the login response token is not a valid header value",
            ));
        }
        tracing::debug!(ttl = ?self.token_ttl, "login succeeded");
        Ok(token)
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    inactivity_expiration_time_hours: u32,
}

#[derive(Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    return_value: Option<String>,
}

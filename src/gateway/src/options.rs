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

//! Configuration for the [Gateway][crate::gateway::Gateway].
//!
//! The configuration is usually loaded from the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `AKADA_BASE_URL` | required |
//! | `AKADA_API_KEY` | required |
//! | `AKADA_USERNAME` | required |
//! | `AKADA_PASSWORD` | required |
//! | `AKADA_TOKEN_TTL_SECONDS` | `82800` |
//! | `AKADA_TOKEN_REFRESH_MARGIN_SECONDS` | `600` |
//! | `AKADA_INACTIVITY_EXPIRATION_HOURS` | `24` |
//! | `AKADA_LOGIN_TIMEOUT_SECONDS` | `30` |
//! | `AKADA_REQUEST_TIMEOUT_SECONDS` | `30` |
//!
//! Applications that manage their own settings can use
//! [GatewayConfig::builder] instead.

use crate::Result;
use crate::errors::{ErrorDetail, GatewayError};
use std::time::Duration;

pub const BASE_URL_VAR: &str = "AKADA_BASE_URL";
pub const API_KEY_VAR: &str = "AKADA_API_KEY";
pub const USERNAME_VAR: &str = "AKADA_USERNAME";
pub const PASSWORD_VAR: &str = "AKADA_PASSWORD";
pub const TOKEN_TTL_VAR: &str = "AKADA_TOKEN_TTL_SECONDS";
pub const REFRESH_MARGIN_VAR: &str = "AKADA_TOKEN_REFRESH_MARGIN_SECONDS";
pub const INACTIVITY_EXPIRATION_VAR: &str = "AKADA_INACTIVITY_EXPIRATION_HOURS";
pub const LOGIN_TIMEOUT_VAR: &str = "AKADA_LOGIN_TIMEOUT_SECONDS";
pub const REQUEST_TIMEOUT_VAR: &str = "AKADA_REQUEST_TIMEOUT_SECONDS";

/// How long a token is used after a successful login, 23 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(82_800);
/// How long before the expiry a token is treated as expired.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(600);
pub const DEFAULT_INACTIVITY_EXPIRATION_HOURS: u32 = 24;
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The validated gateway configuration.
#[derive(Clone, PartialEq)]
pub struct GatewayConfig {
    base_url: String,
    api_key: String,
    username: String,
    password: String,
    token_ttl: Duration,
    refresh_margin: Duration,
    inactivity_expiration_hours: u32,
    login_timeout: Duration,
    request_timeout: Duration,
}

impl GatewayConfig {
    /// Returns a builder with the default settings.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Loads the configuration from the `AKADA_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [Config][crate::errors::ErrorKind::Config]
    /// naming the variable if a required variable is not set, or if a numeric
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut builder = Builder::default()
            .with_base_url(required_var(BASE_URL_VAR)?)
            .with_api_key(required_var(API_KEY_VAR)?)
            .with_username(required_var(USERNAME_VAR)?)
            .with_password(required_var(PASSWORD_VAR)?);
        if let Some(secs) = numeric_var(TOKEN_TTL_VAR)? {
            builder = builder.with_token_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = numeric_var(REFRESH_MARGIN_VAR)? {
            builder = builder.with_refresh_margin(Duration::from_secs(secs));
        }
        if let Some(hours) = numeric_var(INACTIVITY_EXPIRATION_VAR)? {
            let hours = u32::try_from(hours).map_err(|_| {
                GatewayError::config(ErrorDetail::InvalidNumber {
                    var: INACTIVITY_EXPIRATION_VAR,
                    value: hours.to_string(),
                })
            })?;
            builder = builder.with_inactivity_expiration_hours(hours);
        }
        if let Some(secs) = numeric_var(LOGIN_TIMEOUT_VAR)? {
            builder = builder.with_login_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = numeric_var(REQUEST_TIMEOUT_VAR)? {
            builder = builder.with_request_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// The upstream base URL, without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// How long a token is valid after a successful login.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// How long before its expiry a token is refreshed.
    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// The `inactivityExpirationTimeHours` sent with each login.
    pub fn inactivity_expiration_hours(&self) -> u32 {
        self.inactivity_expiration_hours
    }

    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[censored]")
            .field("username", &self.username)
            .field("password", &"[censored]")
            .field("token_ttl", &self.token_ttl)
            .field("refresh_margin", &self.refresh_margin)
            .field(
                "inactivity_expiration_hours",
                &self.inactivity_expiration_hours,
            )
            .field("login_timeout", &self.login_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// A builder for [GatewayConfig].
///
/// # Example
/// ```
/// # use akada_gateway::options::GatewayConfig;
/// # use std::time::Duration;
/// let config = GatewayConfig::builder()
///     .with_base_url("https://api.example.com/v1")
///     .with_api_key("my-api-key")
///     .with_username("front-desk")
///     .with_password("my-password")
///     .with_refresh_margin(Duration::from_secs(300))
///     .build()?;
/// assert_eq!(config.base_url(), "https://api.example.com/v1");
/// # Ok::<(), akada_gateway::errors::GatewayError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Builder {
    base_url: Option<String>,
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token_ttl: Option<Duration>,
    refresh_margin: Option<Duration>,
    inactivity_expiration_hours: Option<u32>,
    login_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl Builder {
    /// Sets the upstream base URL, for example `https://api.example.com/v1`.
    pub fn with_base_url<S: Into<String>>(mut self, v: S) -> Self {
        self.base_url = Some(v.into());
        self
    }

    /// Sets the static API key sent in the `AkadaApiKey` header.
    pub fn with_api_key<S: Into<String>>(mut self, v: S) -> Self {
        self.api_key = Some(v.into());
        self
    }

    pub fn with_username<S: Into<String>>(mut self, v: S) -> Self {
        self.username = Some(v.into());
        self
    }

    pub fn with_password<S: Into<String>>(mut self, v: S) -> Self {
        self.password = Some(v.into());
        self
    }

    /// Sets how long a token is used after a successful login.
    pub fn with_token_ttl(mut self, v: Duration) -> Self {
        self.token_ttl = Some(v);
        self
    }

    /// Sets how long before its expiry a token is treated as expired.
    pub fn with_refresh_margin(mut self, v: Duration) -> Self {
        self.refresh_margin = Some(v);
        self
    }

    pub fn with_inactivity_expiration_hours(mut self, v: u32) -> Self {
        self.inactivity_expiration_hours = Some(v);
        self
    }

    /// Sets the timeout for the login call.
    pub fn with_login_timeout(mut self, v: Duration) -> Self {
        self.login_timeout = Some(v);
        self
    }

    /// Sets the default timeout for each proxied request attempt.
    pub fn with_request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = Some(v);
        self
    }

    /// Validates the settings and returns a [GatewayConfig].
    ///
    /// # Errors
    ///
    /// Returns an error of kind [Config][crate::errors::ErrorKind::Config] if
    /// a required setting is missing or empty, if the base URL is not an
    /// absolute `http` or `https` URL, or if the refresh margin is not shorter
    /// than the token TTL.
    pub fn build(self) -> Result<GatewayConfig> {
        let base_url = required("base_url", self.base_url)?;
        let base_url = validate_base_url(&base_url)?;
        let token_ttl = self.token_ttl.unwrap_or(DEFAULT_TOKEN_TTL);
        let refresh_margin = self.refresh_margin.unwrap_or(DEFAULT_REFRESH_MARGIN);
        if refresh_margin >= token_ttl {
            return Err(GatewayError::config(ErrorDetail::MarginTooLarge {
                margin: refresh_margin,
                ttl: token_ttl,
            }));
        }
        Ok(GatewayConfig {
            base_url,
            api_key: required("api_key", self.api_key)?,
            username: required("username", self.username)?,
            password: required("password", self.password)?,
            token_ttl,
            refresh_margin,
            inactivity_expiration_hours: self
                .inactivity_expiration_hours
                .unwrap_or(DEFAULT_INACTIVITY_EXPIRATION_HOURS),
            login_timeout: self.login_timeout.unwrap_or(DEFAULT_LOGIN_TIMEOUT),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String> {
    match value {
        None => Err(GatewayError::config(ErrorDetail::MissingSetting(name))),
        Some(v) if v.trim().is_empty() => {
            Err(GatewayError::config(ErrorDetail::EmptySetting(name)))
        }
        Some(v) => Ok(v),
    }
}

fn validate_base_url(base_url: &str) -> Result<String> {
    let invalid = || GatewayError::config(ErrorDetail::InvalidBaseUrl(base_url.to_string()));
    let parsed = url::Url::parse(base_url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

fn required_var(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| GatewayError::config(ErrorDetail::MissingVar(name)))
}

fn numeric_var(name: &'static str) -> Result<Option<u64>> {
    let Ok(value) = std::env::var(name) else {
        return Ok(None);
    };
    value.trim().parse::<u64>().map(Some).map_err(|_| {
        GatewayError::config(ErrorDetail::InvalidNumber {
            var: name,
            value: value.clone(),
        })
    })
}

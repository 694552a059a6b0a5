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

//! Errors returned by the gateway.
//!
//! All the fallible operations in this crate return [GatewayError]. The
//! error is cheap to clone: a failed login is shared by every caller that was
//! waiting on the same refresh.

use http::StatusCode;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

/// The category of a [GatewayError].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The login call failed, or returned no token.
    ///
    /// This covers network errors, timeouts, non-success status codes, and
    /// success responses without a usable `returnValue` field.
    UpstreamAuth,

    /// The proxied request failed before a response was received.
    ///
    /// Responses with error status codes are *not* errors for
    /// [Gateway::request][crate::gateway::Gateway::request]; they are returned
    /// to the caller as-is. The JSON helpers map them to this kind.
    UpstreamRequest,

    /// The gateway configuration is missing a value or has an invalid one.
    Config,

    /// A response body could not be decoded.
    Deserialize,
}

impl ErrorKind {
    fn summary(&self) -> &'static str {
        match self {
            ErrorKind::UpstreamAuth => "cannot obtain upstream token",
            ErrorKind::UpstreamRequest => "upstream request failed",
            ErrorKind::Config => "invalid gateway configuration",
            ErrorKind::Deserialize => "cannot decode upstream response",
        }
    }
}

/// Represents an error obtaining a token or issuing an upstream request.
///
/// When the upstream returned a response, the error carries its status code
/// and body so the caller can decide on user-facing messaging.
#[derive(Clone, Debug)]
pub struct GatewayError {
    kind: ErrorKind,
    status: Option<StatusCode>,
    body: Option<String>,
    timeout: bool,
    source: ErrorSource,
}

#[derive(Clone, Debug)]
enum ErrorSource {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl GatewayError {
    /// Creates a new error of the given `kind` wrapping `source`.
    pub fn new<T: Error + Send + Sync + 'static>(kind: ErrorKind, source: T) -> Self {
        Self {
            kind,
            status: None,
            body: None,
            timeout: false,
            source: ErrorSource::Source(Arc::new(source)),
        }
    }

    /// Creates a new error of the given `kind` from a message.
    pub fn from_msg<T: Into<String>>(kind: ErrorKind, message: T) -> Self {
        Self {
            kind,
            status: None,
            body: None,
            timeout: false,
            source: ErrorSource::SimpleMessage(message.into()),
        }
    }

    /// Creates a new error from a transport error.
    pub(crate) fn transport(kind: ErrorKind, source: reqwest::Error) -> Self {
        let timeout = source.is_timeout();
        let status = source.status();
        let mut error = Self::new(kind, source);
        error.timeout = timeout;
        error.status = status;
        error
    }

    /// Creates a new error describing an upstream response.
    pub(crate) fn http<T: Into<String>>(
        kind: ErrorKind,
        status: StatusCode,
        body: String,
        message: T,
    ) -> Self {
        Self {
            kind,
            status: Some(status),
            body: Some(body),
            timeout: false,
            source: ErrorSource::SimpleMessage(message.into()),
        }
    }

    pub(crate) fn auth<T: Error + Send + Sync + 'static>(source: T) -> Self {
        Self::new(ErrorKind::UpstreamAuth, source)
    }

    pub(crate) fn config<T: Error + Send + Sync + 'static>(source: T) -> Self {
        Self::new(ErrorKind::Config, source)
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The upstream status code, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The upstream response body, if a response was received.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns `true` if the error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    /// Returns `true` if the login call failed.
    pub fn is_upstream_auth(&self) -> bool {
        self.kind == ErrorKind::UpstreamAuth
    }

    /// Returns `true` if the proxied call failed.
    pub fn is_upstream_request(&self) -> bool {
        self.kind == ErrorKind::UpstreamRequest
    }
}

impl Error for ErrorSource {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            ErrorSource::SimpleMessage(_) => None,
            ErrorSource::Source(source) => Some(source.as_ref()),
        }
    }
}

impl Display for ErrorSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self {
            ErrorSource::SimpleMessage(message) => write!(f, "{message}"),
            ErrorSource::Source(source) => write!(f, "{source}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.source()
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.kind.summary())?;
        if let Some(status) = self.status {
            write!(f, ", status: {status}")?;
        }
        if let Some(body) = &self.body {
            write!(f, ", body: {body}")?;
        }
        write!(f, ", source: {}", self.source)
    }
}

/// Enumerates the causes of failures detected by this crate.
#[derive(thiserror::Error, Debug)]
pub(crate) enum ErrorDetail {
    #[error("the `{0}` setting is required")]
    MissingSetting(&'static str),
    #[error("the `{0}` setting cannot be empty")]
    EmptySetting(&'static str),
    #[error("the environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("the environment variable `{var}` must be a non-negative integer, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },
    #[error("the base URL `{0}` must be an absolute http or https URL")]
    InvalidBaseUrl(String),
    #[error("the refresh margin ({margin:?}) must be shorter than the token TTL ({ttl:?})")]
    MarginTooLarge {
        margin: std::time::Duration,
        ttl: std::time::Duration,
    },
}

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

//! Types and functions to work with upstream bearer tokens.

use crate::Result;
use std::time::Duration;
use tokio::time::Instant;

/// Represents a bearer token issued by the upstream login endpoint.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in the `Authorization: Bearer` header.
    pub token: String,

    /// The instant at which the token expires.
    ///
    /// If `None`, the token does not expire.
    ///
    /// Note that the `Instant` is not valid across processes. The gateway
    /// never persists tokens, they are refreshed within a process.
    pub expires_at: Option<Instant>,
}

impl Token {
    /// Returns `true` if the token must not be used at `now`.
    ///
    /// A token is treated as expired `margin` before its declared expiry, so
    /// a request does not start with a token that expires mid-flight.
    pub fn is_expired_at(&self, now: Instant, margin: Duration) -> bool {
        self.expires_at.is_some_and(|e| now + margin >= e)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Fetches fresh tokens from the upstream.
///
/// Implementations perform one login per call, the caching and the
/// coalescing of concurrent calls happen in the token cache.
#[async_trait::async_trait]
pub(crate) trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self) -> Result<Token>;
}

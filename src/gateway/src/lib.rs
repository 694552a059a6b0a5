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

//! Authenticated gateway for the Akada studio-management API.
//!
//! The upstream API authenticates every call with a static API key and a
//! short-lived bearer token. The token is obtained by logging in with a
//! username and password. This crate hides that handshake: callers issue
//! requests through a [Gateway] and the gateway attaches valid credentials.
//!
//! - Tokens are cached in memory and reused until they are about to expire.
//! - Concurrent callers that find no valid token share a single login.
//! - A request rejected with `401 Unauthorized` is retried once with a fresh
//!   token.
//!
//! Failures are reported as [GatewayError][errors::GatewayError]. Use
//! [kind()][errors::GatewayError::kind] to distinguish a failed login from a
//! failed upstream request.
//!
//! ```no_run
//! use akada_gateway::Gateway;
//! # async fn sample() -> akada_gateway::Result<()> {
//! let gateway = Gateway::from_env()?;
//! let students: serde_json::Value = gateway.get_json("/studio/students").await?;
//! println!("{students}");
//! # Ok(()) }
//! ```

pub mod errors;

pub mod options;

pub mod token;

pub mod gateway;

/// Header names and values attached to upstream calls.
pub mod headers;

pub(crate) mod login;

/// Caches tokens and coalesces concurrent refreshes.
pub(crate) mod token_cache;

pub use gateway::{Gateway, RequestOptions, Response};
pub use options::GatewayConfig;

/// A `Result` alias where the `Err` case is
/// `akada_gateway::errors::GatewayError`.
pub type Result<T> = std::result::Result<T, crate::errors::GatewayError>;

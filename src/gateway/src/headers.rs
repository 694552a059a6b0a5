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

use crate::Result;
use crate::errors::GatewayError;
use crate::token::Token;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// The name of the header carrying the static API key.
pub const AKADA_API_KEY_HEADER: &str = "AkadaApiKey";

/// Creates the value for the API key header.
///
/// An API key that is not a valid header value is a configuration problem.
pub(crate) fn api_key_header(api_key: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(api_key).map_err(GatewayError::config)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Creates the value for the `Authorization` header.
pub(crate) fn bearer_header(token: &Token) -> Result<HeaderValue> {
    let mut value =
        HeaderValue::from_str(&format!("Bearer {}", token.token)).map_err(GatewayError::auth)?;
    value.set_sensitive(true);
    Ok(value)
}

/// A helper to create the headers attached to every upstream API call.
pub(crate) fn build_auth_headers(api_key: &HeaderValue, token: &Token) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    header_map.insert(api_key_name(), api_key.clone());
    header_map.insert(AUTHORIZATION, bearer_header(token)?);
    Ok(header_map)
}

pub(crate) fn api_key_name() -> HeaderName {
    // `HeaderName::from_static` rejects upper case names, the lookup is case
    // insensitive anyway.
    HeaderName::from_static("akadaapikey")
}

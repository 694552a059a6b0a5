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

//! Issue one authenticated request through the Akada gateway.
//!
//! The gateway is configured from the `AKADA_*` environment variables. Use
//! this program to verify the credentials and the upstream base URL before
//! deploying a service that depends on them.

use akada_gateway::{Gateway, RequestOptions};
use anyhow::{Context, Result};
use clap::Parser;
use http::Method;
use tracing_subscriber::EnvFilter;

const DESCRIPTION: &str = concat!(
    "Logs in to the Akada API with the credentials in the AKADA_* environment",
    " variables, issues a single request, and prints the response."
);

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = DESCRIPTION)]
struct Args {
    /// The upstream path, relative to `AKADA_BASE_URL`.
    #[arg(long, default_value = "/studio/students")]
    path: String,

    /// The HTTP method.
    #[arg(long, default_value = "GET")]
    method: Method,

    /// The log filter, used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    enable_tracing(&args);
    tracing::info!("Configuration: {args:?}");

    let gateway = Gateway::from_env().context("cannot configure the gateway")?;
    let response = gateway
        .request(&args.path, RequestOptions::new(args.method.clone()))
        .await
        .with_context(|| format!("{} {} failed", args.method, args.path))?;

    println!("{}", response.status());
    match response.json::<serde_json::Value>() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }
    if !response.is_success() {
        anyhow::bail!("the upstream returned {}", response.status());
    }
    Ok(())
}

fn enable_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

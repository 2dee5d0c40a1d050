// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Common configuration options for commands in the staking rewards CLI.

use std::{num::ParseIntError, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use nexus_client::{NexusClient, NexusClientConfig, DEFAULT_NEXUS_URL};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Common configuration options for all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalConfig {
    /// Base URL of the Nexus indexer API
    #[clap(long, env = "NEXUS_URL", global = true, default_value = DEFAULT_NEXUS_URL)]
    pub nexus_url: Url,

    /// Retries of a failed indexer request before giving up
    #[clap(long, env = "NEXUS_MAX_RETRIES", global = true, default_value_t = 3)]
    pub max_retries: u32,

    /// Items requested per page from list endpoints
    #[clap(long, env = "NEXUS_PAGE_LIMIT", global = true, default_value_t = 100)]
    pub page_limit: u64,

    /// Timeout of a single indexer request, in seconds.
    #[clap(long, env = "NEXUS_TIMEOUT", global = true, default_value = "30", value_parser = |arg: &str| -> Result<Duration, ParseIntError> {Ok(Duration::from_secs(arg.parse()?))})]
    pub timeout: Duration,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "LOG_LEVEL", global = true, default_value = "info")]
    pub log_level: LevelFilter,

    /// Whether to log in JSON format.
    #[clap(long, env = "LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,
}

impl GlobalConfig {
    /// Settings of the indexer client built from these options.
    pub fn client_config(&self) -> NexusClientConfig {
        NexusClientConfig {
            max_retries: self.max_retries,
            page_limit: self.page_limit,
            timeout: self.timeout,
            ..Default::default()
        }
    }

    /// Build a [NexusClient] for [Self::nexus_url].
    pub fn build_client(&self) -> Result<NexusClient> {
        NexusClient::new(self.nexus_url.clone(), self.client_config())
            .with_context(|| format!("Failed to create Nexus client for {}", self.nexus_url))
    }

    /// Install the global tracing subscriber. Logs go to stderr so that CSV written to
    /// stdout stays clean.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(self.log_level.into())
            .from_env_lossy();

        let builder =
            tracing_subscriber::fmt().with_ansi(false).with_writer(std::io::stderr);
        // A subscriber may already be installed, e.g. by a test harness.
        let result = if self.log_json {
            builder.json().with_env_filter(filter).try_init()
        } else {
            builder.with_env_filter(filter).try_init()
        };
        if let Err(err) = result {
            tracing::debug!("Tracing subscriber already installed: {err}");
        }
    }
}

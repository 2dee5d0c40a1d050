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

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use staking_rewards::{Delegation, EventKind, RawEscrowEvent, StakingSource, ValidatorHistoryEntry};
use url::Url;

use crate::{
    models::{Block, DelegationList, Epoch, EpochList, EventList, ValidatorHistory},
    pagination::{has_more_pages, Paged},
};

pub const DEFAULT_NEXUS_URL: &str = "https://nexus.oasis.io/v1/";

/// Retry, paging and timeout settings of a [NexusClient].
#[derive(Debug, Clone)]
pub struct NexusClientConfig {
    /// Retries of a transient failure before giving up
    pub max_retries: u32,
    /// Items requested per page
    pub page_limit: u64,
    pub min_retry_interval: Duration,
    pub max_retry_interval: Duration,
    /// Timeout of a single request
    pub timeout: Duration,
}

impl Default for NexusClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            page_limit: 100,
            min_retry_interval: Duration::from_millis(500),
            max_retry_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Event type names used by the indexer.
fn event_type(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Add => "staking.escrow.add",
        EventKind::Debond => "staking.escrow.debonding_start",
    }
}

#[derive(Debug, Clone)]
pub struct NexusClient {
    base_url: Url,
    http: ClientWithMiddleware,
    page_limit: u64,
}

impl NexusClient {
    pub fn new(base_url: Url, config: NexusClientConfig) -> Result<Self> {
        let mut base_url = base_url;
        // Joining replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.min_retry_interval, config.max_retry_interval)
            .build_with_max_retries(config.max_retries);
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        tracing::debug!(
            "Nexus client for {base_url} ({} retries, page limit {})",
            config.max_retries,
            config.page_limit
        );
        Ok(Self { base_url, http, page_limit: config.page_limit })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path {path}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::trace!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Request to {url} returned an error status"))?;

        response.json::<T>().await.with_context(|| format!("Failed to decode response of {url}"))
    }

    /// Walk every page of a list endpoint.
    async fn fetch_all<P>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<P::Item>>
    where
        P: Paged + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut offset = 0u64;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("limit", self.page_limit.to_string()));
            page_query.push(("offset", offset.to_string()));

            let page: P = self.get_json(self.endpoint(path, &page_query)?).await?;
            let info = page.page_info().clone();
            let page_items = page.into_items();
            let page_len = page_items.len();
            items.extend(page_items);
            offset += page_len as u64;

            if !has_more_pages(page_len, self.page_limit, items.len(), &info) {
                break;
            }
        }

        tracing::debug!("Fetched {} items from {path}", items.len());
        Ok(items)
    }
}

#[async_trait]
impl StakingSource for NexusClient {
    async fn validator_history(
        &self,
        validator: &str,
        from_epoch: u64,
        to_epoch: u64,
    ) -> Result<Vec<ValidatorHistoryEntry>> {
        let records = self
            .fetch_all::<ValidatorHistory>(
                &format!("consensus/validators/{validator}/history"),
                &[("from", from_epoch.to_string()), ("to", to_epoch.to_string())],
            )
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn escrow_events(&self, address: &str, kind: EventKind) -> Result<Vec<RawEscrowEvent>> {
        let events = self
            .fetch_all::<EventList>(
                "consensus/events",
                &[("rel", address.to_string()), ("type", event_type(kind).to_string())],
            )
            .await?;
        Ok(events.into_iter().map(Into::into).collect())
    }

    async fn delegations(&self, address: &str) -> Result<Vec<Delegation>> {
        let records = self
            .fetch_all::<DelegationList>(&format!("consensus/accounts/{address}/delegations"), &[])
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn epoch_start_height(&self, epoch: u64) -> Result<u64> {
        let epoch: Epoch =
            self.get_json(self.endpoint(&format!("consensus/epochs/{epoch}"), &[])?).await?;
        Ok(epoch.start_height)
    }

    async fn block_timestamp(&self, height: u64) -> Result<DateTime<Utc>> {
        let block: Block =
            self.get_json(self.endpoint(&format!("consensus/blocks/{height}"), &[])?).await?;
        Ok(block.timestamp)
    }

    async fn latest_epoch(&self) -> Result<u64> {
        let list: EpochList =
            self.get_json(self.endpoint("consensus/epochs", &[("limit", "1".to_string())])?).await?;
        list.epochs.first().map(|epoch| epoch.id).context("Indexer returned no epochs")
    }
}

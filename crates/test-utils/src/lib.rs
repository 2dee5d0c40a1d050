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

//! Test utilities for the staking rewards crates.
//!
//! [MockStakingSource] is an in-memory [StakingSource] with a deterministic chain clock:
//! every epoch spans [BLOCKS_PER_EPOCH] blocks of [BLOCK_TIME_SECS] seconds, i.e. one
//! hour, starting at [genesis_time].

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy_primitives::U256;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use staking_rewards::{Delegation, EventKind, RawEscrowEvent, StakingSource, ValidatorHistoryEntry};

pub const BLOCKS_PER_EPOCH: u64 = 600;
pub const BLOCK_TIME_SECS: i64 = 6;

/// Start time of epoch 0.
pub fn genesis_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

/// Start time of `epoch` under the mock clock.
pub fn epoch_start_time(epoch: u64) -> DateTime<Utc> {
    genesis_time() + Duration::seconds(epoch as i64 * BLOCKS_PER_EPOCH as i64 * BLOCK_TIME_SECS)
}

/// A history request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub validator: String,
    pub from_epoch: u64,
    pub to_epoch: u64,
}

#[derive(Default)]
pub struct MockStakingSource {
    latest_epoch: u64,
    history: HashMap<String, Vec<ValidatorHistoryEntry>>,
    events: Vec<(EventKind, RawEscrowEvent)>,
    delegations: HashMap<String, Vec<Delegation>>,
    failing_history: HashSet<String>,
    history_requests: Mutex<Vec<HistoryRequest>>,
}

impl MockStakingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest_epoch(mut self, epoch: u64) -> Self {
        self.latest_epoch = epoch;
        self
    }

    /// Record the active balance and shares of `validator` at `epoch`.
    pub fn with_history(
        mut self,
        validator: &str,
        epoch: u64,
        active_balance: u128,
        active_shares: u128,
    ) -> Self {
        self.history.entry(validator.to_string()).or_default().push(ValidatorHistoryEntry {
            epoch,
            active_balance: U256::from(active_balance),
            active_shares: U256::from(active_shares),
        });
        self
    }

    /// Record a constant share price for `validator` at every epoch in `epochs`.
    pub fn with_flat_history(
        mut self,
        validator: &str,
        epochs: impl IntoIterator<Item = u64>,
        active_balance: u128,
        active_shares: u128,
    ) -> Self {
        for epoch in epochs {
            self = self.with_history(validator, epoch, active_balance, active_shares);
        }
        self
    }

    /// Add an escrow event. Events are returned for every queried address, like the
    /// upstream relation filter that also matches the escrow side.
    pub fn with_event(
        mut self,
        kind: EventKind,
        owner: &str,
        escrow: &str,
        shares: u128,
        amount: u128,
        epoch: Option<u64>,
    ) -> Self {
        self.events.push((
            kind,
            RawEscrowEvent {
                owner: owner.to_string(),
                escrow: escrow.to_string(),
                shares: U256::from(shares),
                amount: U256::from(amount),
                epoch,
            },
        ));
        self
    }

    /// Set the present delegation of `owner` with `validator`.
    pub fn with_delegation(mut self, owner: &str, validator: &str, shares: u128) -> Self {
        self.delegations
            .entry(owner.to_string())
            .or_default()
            .push(Delegation { validator: validator.to_string(), shares: U256::from(shares) });
        self
    }

    /// Make every history request for `validator` fail.
    pub fn with_history_failure(mut self, validator: &str) -> Self {
        self.failing_history.insert(validator.to_string());
        self
    }

    /// History requests received so far, in order.
    pub fn history_requests(&self) -> Vec<HistoryRequest> {
        self.history_requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StakingSource for MockStakingSource {
    async fn validator_history(
        &self,
        validator: &str,
        from_epoch: u64,
        to_epoch: u64,
    ) -> Result<Vec<ValidatorHistoryEntry>> {
        if let Ok(mut requests) = self.history_requests.lock() {
            requests.push(HistoryRequest {
                validator: validator.to_string(),
                from_epoch,
                to_epoch,
            });
        }
        if self.failing_history.contains(validator) {
            bail!("history of {validator} is unavailable");
        }

        // Newest first, like the indexer.
        let mut entries: Vec<_> = self
            .history
            .get(validator)
            .into_iter()
            .flatten()
            .filter(|entry| (from_epoch..=to_epoch).contains(&entry.epoch))
            .copied()
            .collect();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.epoch));
        Ok(entries)
    }

    async fn escrow_events(&self, _address: &str, kind: EventKind) -> Result<Vec<RawEscrowEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|(event_kind, _)| *event_kind == kind)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn delegations(&self, address: &str) -> Result<Vec<Delegation>> {
        Ok(self.delegations.get(address).cloned().unwrap_or_default())
    }

    async fn epoch_start_height(&self, epoch: u64) -> Result<u64> {
        Ok(epoch * BLOCKS_PER_EPOCH + 1)
    }

    async fn block_timestamp(&self, height: u64) -> Result<DateTime<Utc>> {
        let epoch = height.saturating_sub(1) / BLOCKS_PER_EPOCH;
        let offset = height.saturating_sub(1) % BLOCKS_PER_EPOCH;
        Ok(epoch_start_time(epoch) + Duration::seconds(offset as i64 * BLOCK_TIME_SECS))
    }

    async fn latest_epoch(&self) -> Result<u64> {
        Ok(self.latest_epoch)
    }
}

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

//! The upstream data the engine reads, expressed as a trait so the HTTP client and the
//! in-memory test source are interchangeable.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{events::EventKind, history::ValidatorHistoryEntry};

/// An escrow event as reported upstream, before owner filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEscrowEvent {
    /// Delegator that owns the escrowed shares
    pub owner: String,
    /// Validator (escrow account) the shares are held with
    pub escrow: String,
    /// `new_shares` for additions, `debonding_shares` for debonds
    pub shares: U256,
    /// Token amount moved, in base units
    pub amount: U256,
    /// Epoch of the event, when the upstream record carries one
    pub epoch: Option<u64>,
}

/// A present-moment delegation held by an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub validator: String,
    pub shares: U256,
}

/// Read-only access to the staking indexer.
///
/// Implementations own retries and pagination: every method either returns the complete
/// answer or an error that the engine treats as fatal.
#[async_trait]
pub trait StakingSource: Send + Sync {
    /// History entries of `validator` with epochs in `[from_epoch, to_epoch]`.
    async fn validator_history(
        &self,
        validator: &str,
        from_epoch: u64,
        to_epoch: u64,
    ) -> anyhow::Result<Vec<ValidatorHistoryEntry>>;

    /// Every escrow event of `kind` related to `address`. The relation is advisory and may
    /// include events owned by other addresses.
    async fn escrow_events(
        &self,
        address: &str,
        kind: EventKind,
    ) -> anyhow::Result<Vec<RawEscrowEvent>>;

    /// Current delegations of `address`.
    async fn delegations(&self, address: &str) -> anyhow::Result<Vec<Delegation>>;

    /// Height of the first block of `epoch`.
    async fn epoch_start_height(&self, epoch: u64) -> anyhow::Result<u64>;

    /// Timestamp of the block at `height`.
    async fn block_timestamp(&self, height: u64) -> anyhow::Result<DateTime<Utc>>;

    /// The most recent epoch known to the indexer.
    async fn latest_epoch(&self) -> anyhow::Result<u64>;
}

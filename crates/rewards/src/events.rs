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

//! Escrow event collection and classification.

use std::fmt;

use alloy_primitives::U256;
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    epochs::EpochRange,
    source::{RawEscrowEvent, StakingSource},
    RewardsError,
};

/// Kind of escrow event tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Shares added to a delegation
    Add,
    /// Shares moved out of a delegation into debonding
    Debond,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Debond => write!(f, "debond"),
        }
    }
}

/// A delegation or debonding owned by the queried address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationEvent {
    /// Epoch of the event; 0 when the upstream record carries none
    pub epoch: u64,
    pub validator: String,
    pub owner: String,
    pub kind: EventKind,
    pub shares_delta: U256,
    /// Token amount moved, informational only
    pub amount: U256,
}

impl DelegationEvent {
    /// Classify a raw upstream event.
    pub fn from_raw(raw: RawEscrowEvent, kind: EventKind) -> Self {
        Self {
            epoch: raw.epoch.unwrap_or(0),
            validator: raw.escrow,
            owner: raw.owner,
            kind,
            shares_delta: raw.shares,
            amount: raw.amount,
        }
    }
}

/// Events of an address split around the start of the requested period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedEvents {
    /// Events before the period start, including every event without an epoch
    pub prior: Vec<DelegationEvent>,
    /// Events within the period, sorted by epoch
    pub in_period: Vec<DelegationEvent>,
}

impl CollectedEvents {
    /// True when the address has no relevant events at all.
    pub fn is_empty(&self) -> bool {
        self.prior.is_empty() && self.in_period.is_empty()
    }
}

/// Fetch the escrow events owned by `address` and partition them around `range`.
pub async fn collect_events<S: StakingSource + ?Sized>(
    source: &S,
    address: &str,
    range: EpochRange,
) -> Result<CollectedEvents, RewardsError> {
    let mut owned = Vec::new();

    for kind in [EventKind::Add, EventKind::Debond] {
        let raw = source
            .escrow_events(address, kind)
            .await
            .with_context(|| format!("Failed to fetch {kind} events for {address}"))?;
        let fetched = raw.len();

        // The upstream relation also matches events where the address is the escrow.
        owned.extend(
            raw.into_iter()
                .filter(|event| event.owner.eq_ignore_ascii_case(address))
                .map(|event| DelegationEvent::from_raw(event, kind)),
        );
        tracing::debug!("Fetched {fetched} {kind} events related to {address}");
    }

    let collected = partition_events(owned, range);
    tracing::info!(
        "Collected {} prior and {} in-period events for {address}",
        collected.prior.len(),
        collected.in_period.len()
    );

    Ok(collected)
}

/// Split `events` into those before `range` and those within it. Events after the range
/// are dropped.
///
/// An event without an epoch was given epoch 0 and is therefore always prior, even if it
/// happened during the period. This mirrors what the upstream data allows and is reported
/// rather than corrected.
pub fn partition_events(events: Vec<DelegationEvent>, range: EpochRange) -> CollectedEvents {
    let mut collected = CollectedEvents::default();
    let mut without_epoch = 0usize;

    for event in events {
        if event.epoch == 0 {
            without_epoch += 1;
        }
        if event.epoch < range.start_epoch {
            collected.prior.push(event);
        } else if range.contains(event.epoch) {
            collected.in_period.push(event);
        }
    }

    if without_epoch > 0 {
        tracing::warn!(
            "{without_epoch} events carry no epoch and were classified as prior to epoch {}",
            range.start_epoch
        );
    }

    // Stable so same-epoch events keep their upstream order.
    collected.in_period.sort_by_key(|event| event.epoch);
    collected
}

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

//! Entry point of a reward computation.

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::{
    accumulator::{RewardAccumulator, RewardRow},
    epochs::{checkpoints, epochs_for_year, month_boundary_epochs, Granularity},
    events::collect_events,
    ledger::{active_validators, present_shares, reconstruct_start_shares},
    source::StakingSource,
    RewardsError,
};

/// Parameters of one reward computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardsRequest {
    /// Delegator address
    pub address: String,
    /// Calendar year to compute rewards for
    pub year: i32,
    pub granularity: Granularity,
}

/// Compute the rewards earned by `request.address` during `request.year`.
///
/// Rows are ordered by checkpoint, then validator. An unsupported year or an address without
/// any activity yields no rows. Any upstream failure aborts the computation without partial
/// results.
pub async fn compute_rewards<S: StakingSource + ?Sized>(
    source: &S,
    request: &RewardsRequest,
    cancel: &CancellationToken,
) -> Result<Vec<RewardRow>, RewardsError> {
    let start_time = std::time::Instant::now();
    let RewardsRequest { address, year, granularity } = request;

    let range = match epochs_for_year(source, *year).await {
        Ok(range) => range,
        Err(RewardsError::UnsupportedPeriod { year }) => {
            tracing::info!("No epoch boundaries for {year}; nothing to compute");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err),
    };
    let boundaries = month_boundary_epochs(*year)?;
    let checkpoints = checkpoints(*granularity, range, &boundaries);
    tracing::info!(
        "Computing {granularity} rewards of {address} for {year} (epochs {}..={}, {} checkpoints)",
        range.start_epoch,
        range.end_epoch,
        checkpoints.len()
    );

    let events = collect_events(source, address, range).await?;
    let delegations = source
        .delegations(address)
        .await
        .with_context(|| format!("Failed to fetch delegations of {address}"))?;
    let present = present_shares(&delegations);

    if events.is_empty() && present.values().all(|shares| shares.is_zero()) {
        tracing::info!("{address} has no escrow events and no delegations");
        return Ok(Vec::new());
    }

    let start_shares = reconstruct_start_shares(&present, &events.in_period);
    let validators = active_validators(&start_shares, &present, &events.in_period);
    if validators.is_empty() {
        tracing::info!("{address} held no shares during {year}");
        return Ok(Vec::new());
    }
    tracing::debug!("Active validators: {validators:?}");

    let mut accumulator = RewardAccumulator::new(source, range.start_epoch, cancel.clone());
    accumulator.initialize(&start_shares, &validators).await?;
    let rows = accumulator.run(&checkpoints, &events.in_period).await?;

    tracing::info!(
        "Computed {} reward rows across {} validators in {:.2}s",
        rows.len(),
        validators.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(rows)
}

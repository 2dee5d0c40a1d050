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

//! Checkpointed reward accumulation.
//!
//! Between two checkpoints a position's value changes for two reasons: the share price
//! moves (reward or slashing) and principal is delegated or undelegated. The accumulator
//! replays in-period events to track the principal moved, then attributes the rest of the
//! value change to rewards:
//!
//! `earned = value(now) - value(prev) - delegated + undelegated`
//!
//! Checkpoints must be processed in increasing order. Each row starts where the previous
//! row of the same validator ended, so the rewards of consecutive rows sum to the reward
//! over their combined span.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{I256, U256};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::EpochClock,
    events::{DelegationEvent, EventKind},
    history::{total_value, SharePrice, ValidatorHistoryCache},
    source::StakingSource,
    RewardsError,
};

/// Running state of one validator position during a computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorState {
    /// Shares held after the events replayed so far
    pub shares: U256,
    /// Position value at `prev_epoch`
    pub prev_total_value: U256,
    /// Epoch of the last emitted row, or the period start
    pub prev_epoch: u64,
    /// Principal delegated since `prev_epoch`
    pub period_delegation_value: U256,
    /// Principal undelegated since `prev_epoch`
    pub period_undelegation_value: U256,
    /// No value is known at `prev_epoch`; the next checkpoint with history becomes the
    /// baseline instead of emitting a row
    pub baseline_pending: bool,
}

/// Reward earned with one validator between two checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardRow {
    pub start_epoch: u64,
    pub end_epoch: u64,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub validator: String,
    /// Shares held at `end_epoch`
    pub shares: U256,
    /// Share price at `end_epoch`
    pub share_price: SharePrice,
    /// Position value at `end_epoch`, in base units
    pub delegation_value: U256,
    /// Reward in base units; negative for a loss
    pub rewards: I256,
}

/// Value change not explained by principal movements.
pub fn earned(
    prev_total_value: U256,
    total_value: U256,
    delegated: U256,
    undelegated: U256,
) -> Result<I256, RewardsError> {
    let gained = total_value
        .checked_add(undelegated)
        .ok_or(RewardsError::ArithmeticOverflow("earned rewards"))?;
    let basis = prev_total_value
        .checked_add(delegated)
        .ok_or(RewardsError::ArithmeticOverflow("earned rewards"))?;

    let (magnitude, negative) =
        if gained >= basis { (gained - basis, false) } else { (basis - gained, true) };
    let magnitude = I256::try_from(magnitude)
        .map_err(|_| RewardsError::ArithmeticOverflow("earned rewards"))?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Walks checkpoints for one computation, owning all per-validator state.
pub struct RewardAccumulator<'a, S: ?Sized> {
    history: ValidatorHistoryCache<'a, S>,
    clock: EpochClock<'a, S>,
    states: BTreeMap<String, ValidatorState>,
    start_epoch: u64,
    last_processed_epoch: u64,
    cancel: CancellationToken,
}

impl<'a, S: StakingSource + ?Sized> RewardAccumulator<'a, S> {
    pub fn new(source: &'a S, start_epoch: u64, cancel: CancellationToken) -> Self {
        Self {
            history: ValidatorHistoryCache::new(source),
            clock: EpochClock::new(source),
            states: BTreeMap::new(),
            start_epoch,
            last_processed_epoch: start_epoch,
            cancel,
        }
    }

    /// Create the state of each active validator from its shares at the period start.
    pub async fn initialize(
        &mut self,
        start_shares: &BTreeMap<String, U256>,
        validators: &BTreeSet<String>,
    ) -> Result<(), RewardsError> {
        for validator in validators {
            self.check_cancelled()?;

            let shares = start_shares.get(validator).copied().unwrap_or_default();
            let mut state =
                ValidatorState { shares, prev_epoch: self.start_epoch, ..Default::default() };
            if !shares.is_zero() {
                match self.history.get(validator, self.start_epoch).await? {
                    Some(entry) => state.prev_total_value = total_value(shares, &entry)?,
                    None => {
                        tracing::warn!(
                            "No history for {validator} at start epoch {}; deferring its baseline to the first checkpoint with history",
                            self.start_epoch
                        );
                        state.baseline_pending = true;
                    }
                }
            }

            self.states.insert(validator.clone(), state);
        }

        tracing::debug!(
            "Initialized {} validators at epoch {}",
            self.states.len(),
            self.start_epoch
        );
        Ok(())
    }

    /// Process `checkpoints` in order, replaying `in_period` events (sorted by epoch) as
    /// they are passed, and return one row per validator per checkpoint with history.
    ///
    /// Events at exactly the period start belong to the first checkpoint.
    pub async fn run(
        &mut self,
        checkpoints: &[u64],
        in_period: &[DelegationEvent],
    ) -> Result<Vec<RewardRow>, RewardsError> {
        let mut rows = Vec::new();
        let mut next_event = 0;

        for &checkpoint in checkpoints {
            self.check_cancelled()?;

            while let Some(event) = in_period.get(next_event).filter(|e| e.epoch <= checkpoint) {
                self.check_cancelled()?;
                self.replay(event).await?;
                next_event += 1;
            }

            let checkpoint_rows = self.sample(checkpoint).await?;
            tracing::info!(
                "Checkpoint {checkpoint}: {} rows (epochs {}..={checkpoint})",
                checkpoint_rows.len(),
                self.last_processed_epoch
            );
            rows.extend(checkpoint_rows);
            self.last_processed_epoch = checkpoint;
        }

        if next_event < in_period.len() {
            tracing::warn!(
                "{} in-period events fall after the last checkpoint and were not replayed",
                in_period.len() - next_event
            );
        }

        Ok(rows)
    }

    /// State of `validator`, if it takes part in the computation.
    pub fn state(&self, validator: &str) -> Option<&ValidatorState> {
        self.states.get(validator)
    }

    /// Epoch of the last processed checkpoint, or the period start.
    pub fn last_processed_epoch(&self) -> u64 {
        self.last_processed_epoch
    }

    async fn replay(&mut self, event: &DelegationEvent) -> Result<(), RewardsError> {
        let principal = match self.history.get(&event.validator, event.epoch).await? {
            Some(entry) => total_value(event.shares_delta, &entry)?,
            None => {
                tracing::warn!(
                    "No history for {} at epoch {}; using the reported amount {} as principal",
                    event.validator,
                    event.epoch,
                    event.amount
                );
                event.amount
            }
        };

        let start_epoch = self.start_epoch;
        let state = self
            .states
            .entry(event.validator.clone())
            .or_insert_with(|| ValidatorState { prev_epoch: start_epoch, ..Default::default() });

        match event.kind {
            EventKind::Add => {
                state.shares = state
                    .shares
                    .checked_add(event.shares_delta)
                    .ok_or(RewardsError::ArithmeticOverflow("shares"))?;
                state.period_delegation_value = state
                    .period_delegation_value
                    .checked_add(principal)
                    .ok_or(RewardsError::ArithmeticOverflow("delegated principal"))?;
            }
            EventKind::Debond => {
                if state.shares < event.shares_delta {
                    tracing::warn!(
                        "Debond of {} shares at epoch {} exceeds the {} shares held with {}; clamping to zero",
                        event.shares_delta,
                        event.epoch,
                        state.shares,
                        event.validator
                    );
                }
                state.shares = state.shares.saturating_sub(event.shares_delta);
                state.period_undelegation_value = state
                    .period_undelegation_value
                    .checked_add(principal)
                    .ok_or(RewardsError::ArithmeticOverflow("undelegated principal"))?;
            }
        }

        tracing::debug!(
            "Replayed {} of {} shares with {} at epoch {} (principal {principal})",
            event.kind,
            event.shares_delta,
            event.validator,
            event.epoch
        );
        Ok(())
    }

    async fn sample(&mut self, checkpoint: u64) -> Result<Vec<RewardRow>, RewardsError> {
        let sampled: Vec<(String, ValidatorState)> = self
            .states
            .iter()
            .filter(|(_, state)| !state.shares.is_zero() || !state.prev_total_value.is_zero())
            .map(|(validator, state)| (validator.clone(), state.clone()))
            .collect();

        let mut rows = Vec::with_capacity(sampled.len());
        for (validator, state) in sampled {
            self.check_cancelled()?;

            let Some(entry) = self.history.get(&validator, checkpoint).await? else {
                tracing::warn!(
                    "No history for {validator} at checkpoint {checkpoint}; skipping it until history is available"
                );
                continue;
            };

            let delegation_value = total_value(state.shares, &entry)?;
            if state.baseline_pending {
                tracing::warn!(
                    "Baseline of {validator} set at checkpoint {checkpoint}; epochs {}..{checkpoint} are not reported",
                    state.prev_epoch
                );
                self.states.insert(
                    validator,
                    ValidatorState {
                        shares: state.shares,
                        prev_total_value: delegation_value,
                        prev_epoch: checkpoint,
                        ..Default::default()
                    },
                );
                continue;
            }

            let rewards = earned(
                state.prev_total_value,
                delegation_value,
                state.period_delegation_value,
                state.period_undelegation_value,
            )?;

            rows.push(RewardRow {
                start_epoch: state.prev_epoch,
                end_epoch: checkpoint,
                start_timestamp: self.clock.start_time(state.prev_epoch).await?,
                end_timestamp: self.clock.start_time(checkpoint).await?,
                validator: validator.clone(),
                shares: state.shares,
                share_price: entry.share_price(),
                delegation_value,
                rewards,
            });

            self.states.insert(
                validator,
                ValidatorState {
                    shares: state.shares,
                    prev_total_value: delegation_value,
                    prev_epoch: checkpoint,
                    ..Default::default()
                },
            );
        }

        Ok(rows)
    }

    fn check_cancelled(&self) -> Result<(), RewardsError> {
        if self.cancel.is_cancelled() {
            return Err(RewardsError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earned_u64(prev: u64, current: u64, delegated: u64, undelegated: u64) -> I256 {
        let [prev, current, delegated, undelegated] =
            [prev, current, delegated, undelegated].map(U256::from);
        earned(prev, current, delegated, undelegated).unwrap()
    }

    #[test]
    fn test_earned_with_delegation() {
        assert_eq!(earned_u64(1000, 2100, 1000, 0), I256::try_from(100).unwrap());
    }

    #[test]
    fn test_earned_with_undelegation() {
        assert_eq!(earned_u64(2000, 1050, 0, 1000), I256::try_from(50).unwrap());
    }

    #[test]
    fn test_earned_with_both_movements() {
        assert_eq!(earned_u64(1000, 1100, 500, 400), I256::ZERO);
    }

    #[test]
    fn test_earned_loss_is_negative() {
        assert_eq!(earned_u64(1000, 900, 0, 0), I256::try_from(-100).unwrap());
        assert!(earned_u64(1000, 900, 0, 0).is_negative());
    }

    #[test]
    fn test_earned_without_movements_is_growth() {
        assert_eq!(earned_u64(1000, 1234, 0, 0), I256::try_from(234).unwrap());
    }

    #[test]
    fn test_earned_overflow() {
        assert!(matches!(
            earned(U256::ZERO, U256::MAX, U256::ZERO, U256::from(1)),
            Err(RewardsError::ArithmeticOverflow(_))
        ));
    }
}

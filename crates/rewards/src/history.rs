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

//! Validator share price history and the per-computation lookup cache.

use std::collections::HashMap;

use alloy_primitives::U256;
use anyhow::Context;

use crate::{source::StakingSource, RewardsError, HISTORY_WINDOW};

/// Active balance and shares of a validator at an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorHistoryEntry {
    pub epoch: u64,
    /// Tokens backing the active shares, in base units
    pub active_balance: U256,
    pub active_shares: U256,
}

impl ValidatorHistoryEntry {
    /// Share price at this entry's epoch.
    pub fn share_price(&self) -> SharePrice {
        SharePrice { active_balance: self.active_balance, active_shares: self.active_shares }
    }
}

/// Exact share price, `active_balance / active_shares`.
///
/// Kept as a ratio and only divided when rendered, see [SharePrice::to_decimal_string].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharePrice {
    pub active_balance: U256,
    pub active_shares: U256,
}

/// Value in base units of `shares` at the share price of `entry`, rounded down.
///
/// Multiplies before dividing so small prices are not truncated before scaling. A validator
/// without active shares values every position at zero.
pub fn total_value(shares: U256, entry: &ValidatorHistoryEntry) -> Result<U256, RewardsError> {
    if entry.active_shares.is_zero() {
        return Ok(U256::ZERO);
    }
    let scaled = shares
        .checked_mul(entry.active_balance)
        .ok_or(RewardsError::ArithmeticOverflow("position value"))?;
    Ok(scaled / entry.active_shares)
}

/// Entry with the greatest epoch not exceeding `target` in a slice sorted ascending by
/// epoch, or `None` when `target` precedes every entry.
pub fn nearest_at_or_before<T>(
    history: &[T],
    target: u64,
    epoch_of: impl Fn(&T) -> u64,
) -> Option<&T> {
    let after = history.partition_point(|entry| epoch_of(entry) <= target);
    after.checked_sub(1).and_then(|index| history.get(index))
}

/// Memoized history lookups for one reward computation.
///
/// Each miss queries a window of [HISTORY_WINDOW] epochs on either side of the target, so
/// the response size does not depend on how long the validator has existed. Absent entries
/// are memoized as well.
pub struct ValidatorHistoryCache<'a, S: ?Sized> {
    source: &'a S,
    entries: HashMap<(String, u64), Option<ValidatorHistoryEntry>>,
}

impl<'a, S: StakingSource + ?Sized> ValidatorHistoryCache<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source, entries: HashMap::new() }
    }

    /// History of `validator` at `epoch`: the nearest entry at or before it within the
    /// lookup window.
    pub async fn get(
        &mut self,
        validator: &str,
        epoch: u64,
    ) -> Result<Option<ValidatorHistoryEntry>, RewardsError> {
        let key = (validator.to_string(), epoch);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(*entry);
        }

        let from_epoch = epoch.saturating_sub(HISTORY_WINDOW);
        let to_epoch = epoch.saturating_add(HISTORY_WINDOW);
        let mut window = self
            .source
            .validator_history(validator, from_epoch, to_epoch)
            .await
            .with_context(|| {
                format!("Failed to fetch history of {validator} for epochs {from_epoch}..={to_epoch}")
            })?;
        window.sort_by_key(|entry| entry.epoch);

        let entry = nearest_at_or_before(&window, epoch, |entry| entry.epoch).copied();
        tracing::debug!(
            "History of {validator} at epoch {epoch}: {} entries in window, nearest {:?}",
            window.len(),
            entry.map(|entry| entry.epoch)
        );

        self.entries.insert(key, entry);
        Ok(entry)
    }

    /// Number of memoized lookups.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Labeled {
        epoch: u64,
        v: char,
    }

    fn lookup(history: &[Labeled], target: u64) -> Option<char> {
        nearest_at_or_before(history, target, |entry| entry.epoch).map(|entry| entry.v)
    }

    fn entry(balance: u64, shares: u64) -> ValidatorHistoryEntry {
        ValidatorHistoryEntry {
            epoch: 1,
            active_balance: U256::from(balance),
            active_shares: U256::from(shares),
        }
    }

    #[test]
    fn test_nearest_at_or_before() {
        let history = [
            Labeled { epoch: 100, v: 'a' },
            Labeled { epoch: 200, v: 'b' },
            Labeled { epoch: 300, v: 'c' },
        ];
        assert_eq!(lookup(&history, 200), Some('b'));
        assert_eq!(lookup(&history, 250), Some('b'));
        assert_eq!(lookup(&history, 50), None);
        assert_eq!(lookup(&history, 500), Some('c'));
    }

    #[test]
    fn test_nearest_at_or_before_single_entry() {
        let history = [Labeled { epoch: 100, v: 'a' }];
        assert_eq!(lookup(&history, 50), None);
        assert_eq!(lookup(&history, 100), Some('a'));
        assert_eq!(lookup(&history, 150), Some('a'));
    }

    #[test]
    fn test_nearest_at_or_before_empty() {
        assert_eq!(lookup(&[], 100), None);
    }

    #[test]
    fn test_total_value_floors() {
        // 7 * 10 / 3 = 23.33..
        assert_eq!(total_value(U256::from(7), &entry(10, 3)).unwrap(), U256::from(23));
        assert_eq!(total_value(U256::ZERO, &entry(10, 3)).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_total_value_multiplies_first() {
        // A price of 1/3 would truncate to zero if divided first.
        assert_eq!(total_value(U256::from(900), &entry(1, 3)).unwrap(), U256::from(300));
    }

    #[test]
    fn test_total_value_matches_floor_and_is_monotonic() {
        let shares = [0u64, 1, 999, 1_000_000_007];
        let pool_shares = [1u64, 3, 1_000, 999_999_937];
        for &k in &shares {
            for &s in &pool_shares {
                let mut previous = U256::ZERO;
                for b in [0u64, 1, 2, 17, 1_000, 123_456_789, 10_000_000_000] {
                    let value = total_value(U256::from(k), &entry(b, s)).unwrap();
                    let expected = (k as u128 * b as u128) / s as u128;
                    assert_eq!(value, U256::from(expected), "k={k} b={b} s={s}");
                    assert!(value >= previous, "not monotonic at k={k} b={b} s={s}");
                    previous = value;
                }
            }
        }
    }

    #[test]
    fn test_total_value_without_shares() {
        assert_eq!(total_value(U256::from(5), &entry(100, 0)).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_total_value_large_magnitudes() {
        // Balances and share counts with 20 significant digits.
        let shares = U256::from(12_345_678_901_234_567_890u128);
        let history = ValidatorHistoryEntry {
            epoch: 1,
            active_balance: U256::from(98_765_432_109_876_543_210u128),
            active_shares: U256::from(87_654_321_098_765_432_109u128),
        };
        let expected = U256::from(12_345_678_901_234_567_890u128)
            * U256::from(98_765_432_109_876_543_210u128)
            / U256::from(87_654_321_098_765_432_109u128);
        assert_eq!(total_value(shares, &history).unwrap(), expected);
    }

    #[test]
    fn test_total_value_overflow() {
        let history = ValidatorHistoryEntry {
            epoch: 1,
            active_balance: U256::MAX,
            active_shares: U256::from(1),
        };
        assert!(matches!(
            total_value(U256::from(2), &history),
            Err(RewardsError::ArithmeticOverflow(_))
        ));
    }
}

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

//! Share balances at the start of a period, recovered from present balances.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::U256;

use crate::{
    events::{DelegationEvent, EventKind},
    source::Delegation,
};

/// Present share balance per validator. Multiple delegations to one validator are summed.
pub fn present_shares(delegations: &[Delegation]) -> BTreeMap<String, U256> {
    let mut shares: BTreeMap<String, U256> = BTreeMap::new();
    for delegation in delegations {
        let balance = shares.entry(delegation.validator.clone()).or_default();
        *balance = balance.saturating_add(delegation.shares);
    }
    shares
}

/// Undo the in-period events on top of the present balances.
///
/// `shares(start) = shares(now) - sum(adds) + sum(debonds)`, applied one event at a time and
/// clamped at zero. Validators whose start balance is zero are omitted.
pub fn reconstruct_start_shares(
    present: &BTreeMap<String, U256>,
    in_period: &[DelegationEvent],
) -> BTreeMap<String, U256> {
    let mut shares = present.clone();

    for event in in_period {
        let balance = shares.entry(event.validator.clone()).or_default();
        match event.kind {
            EventKind::Add => {
                if *balance < event.shares_delta {
                    tracing::warn!(
                        "Undoing add of {} shares at epoch {} exceeds the {} shares held with {}; clamping to zero",
                        event.shares_delta,
                        event.epoch,
                        balance,
                        event.validator
                    );
                }
                *balance = balance.saturating_sub(event.shares_delta);
            }
            EventKind::Debond => {
                *balance = balance.saturating_add(event.shares_delta);
            }
        }
    }

    shares.retain(|_, balance| !balance.is_zero());
    shares
}

/// Validators that take part in a computation: those holding shares at the start or now,
/// and those touched by any in-period event.
pub fn active_validators(
    start_shares: &BTreeMap<String, U256>,
    present: &BTreeMap<String, U256>,
    in_period: &[DelegationEvent],
) -> BTreeSet<String> {
    start_shares
        .iter()
        .chain(present.iter())
        .filter(|(_, shares)| !shares.is_zero())
        .map(|(validator, _)| validator.clone())
        .chain(in_period.iter().map(|event| event.validator.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn event(validator: &str, kind: EventKind, shares: u64) -> DelegationEvent {
        DelegationEvent {
            epoch: 150,
            validator: validator.to_string(),
            owner: "owner".to_string(),
            kind,
            shares_delta: U256::from(shares),
            amount: U256::ZERO,
        }
    }

    fn present(entries: &[(&str, u64)]) -> BTreeMap<String, U256> {
        entries.iter().map(|(v, s)| (v.to_string(), U256::from(*s))).collect()
    }

    #[test]
    fn test_undo_add() {
        let start = reconstruct_start_shares(
            &present(&[("a", 1500)]),
            &[event("a", EventKind::Add, 500)],
        );
        assert_eq!(start["a"], U256::from(1000));
    }

    #[test]
    fn test_undo_debond() {
        let start = reconstruct_start_shares(
            &present(&[("a", 700)]),
            &[event("a", EventKind::Debond, 300)],
        );
        assert_eq!(start["a"], U256::from(1000));
    }

    #[test]
    fn test_no_events_keeps_present() {
        let now = present(&[("a", 10), ("b", 20)]);
        assert_eq!(reconstruct_start_shares(&now, &[]), now);
    }

    #[test]
    #[traced_test]
    fn test_clamps_at_zero() {
        let start = reconstruct_start_shares(
            &present(&[("a", 100)]),
            &[event("a", EventKind::Add, 250), event("a", EventKind::Debond, 40)],
        );
        // Clamped to zero by the add, then the debond is added back.
        assert_eq!(start["a"], U256::from(40));
        assert!(logs_contain("clamping to zero"));
    }

    #[test]
    fn test_delegated_within_period_starts_empty() {
        let start = reconstruct_start_shares(
            &present(&[("a", 500)]),
            &[event("a", EventKind::Add, 500)],
        );
        assert!(!start.contains_key("a"));
    }

    #[test]
    fn test_active_validators_union() {
        let now = present(&[("now", 5), ("empty", 0)]);
        let start = present(&[("start", 7)]);
        let events = [event("touched", EventKind::Add, 1), event("touched", EventKind::Debond, 1)];

        let active = active_validators(&start, &now, &events);
        assert_eq!(
            active.into_iter().collect::<Vec<_>>(),
            vec!["now".to_string(), "start".to_string(), "touched".to_string()]
        );
    }

    #[test]
    fn test_present_shares_sums_duplicates() {
        let delegations = vec![
            Delegation { validator: "a".to_string(), shares: U256::from(3) },
            Delegation { validator: "a".to_string(), shares: U256::from(4) },
            Delegation { validator: "b".to_string(), shares: U256::from(1) },
        ];
        let shares = present_shares(&delegations);
        assert_eq!(shares["a"], U256::from(7));
        assert_eq!(shares["b"], U256::from(1));
    }
}

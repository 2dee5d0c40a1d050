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

//! Response bodies of the Nexus endpoints used by the client.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use staking_rewards::{Delegation, RawEscrowEvent, ValidatorHistoryEntry};

use crate::pagination::{PageInfo, Paged};

/// Big integers are encoded as decimal strings, or as plain numbers when small.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Decimal(String),
        Number(u64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Encoded::deserialize(deserializer)? {
            Encoded::Decimal(value) => U256::from_str_radix(value.trim(), 10)
                .map_err(|err| D::Error::custom(format!("invalid integer {value:?}: {err}"))),
            Encoded::Number(value) => Ok(U256::from(value)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventList {
    pub events: Vec<ConsensusEvent>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusEvent {
    pub body: EscrowEventBody,
}

/// Body of `staking.escrow.add` and `staking.escrow.debonding_start` events.
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowEventBody {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub escrow: String,
    #[serde(alias = "new_shares", alias = "debonding_shares", default, with = "u256_decimal")]
    pub shares: U256,
    #[serde(default, with = "u256_decimal")]
    pub amount: U256,
    #[serde(default)]
    pub epoch: Option<u64>,
}

impl From<ConsensusEvent> for RawEscrowEvent {
    fn from(event: ConsensusEvent) -> Self {
        let body = event.body;
        Self {
            owner: body.owner,
            escrow: body.escrow,
            shares: body.shares,
            amount: body.amount,
            epoch: body.epoch,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegationList {
    pub delegations: Vec<DelegationRecord>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegationRecord {
    pub validator: String,
    #[serde(with = "u256_decimal")]
    pub shares: U256,
}

impl From<DelegationRecord> for Delegation {
    fn from(record: DelegationRecord) -> Self {
        Self { validator: record.validator, shares: record.shares }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorHistory {
    pub history: Vec<HistoryRecord>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRecord {
    pub epoch: u64,
    #[serde(default, with = "u256_decimal")]
    pub active_balance: U256,
    #[serde(default, with = "u256_decimal")]
    pub active_shares: U256,
}

impl From<HistoryRecord> for ValidatorHistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        Self {
            epoch: record.epoch,
            active_balance: record.active_balance,
            active_shares: record.active_shares,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Epoch {
    pub id: u64,
    pub start_height: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpochList {
    pub epochs: Vec<Epoch>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub timestamp: DateTime<Utc>,
}

macro_rules! impl_paged {
    ($list:ty, $field:ident, $item:ty) => {
        impl Paged for $list {
            type Item = $item;

            fn page_info(&self) -> &PageInfo {
                &self.page
            }

            fn into_items(self) -> Vec<Self::Item> {
                self.$field
            }
        }
    };
}

impl_paged!(EventList, events, ConsensusEvent);
impl_paged!(DelegationList, delegations, DelegationRecord);
impl_paged!(ValidatorHistory, history, HistoryRecord);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_list_parses_big_integers() {
        let json = r#"{
            "events": [{
                "block": 100,
                "type": "staking.escrow.add",
                "body": {
                    "owner": "oasis1owner",
                    "escrow": "oasis1validator",
                    "new_shares": "123456789012345678901234567890",
                    "amount": 42,
                    "epoch": 30000
                }
            }],
            "total_count": 1,
            "is_total_count_clipped": false
        }"#;

        let list: EventList = serde_json::from_str(json).unwrap();
        let event = RawEscrowEvent::from(list.events[0].clone());
        assert_eq!(event.shares, U256::from(123456789012345678901234567890u128));
        assert_eq!(event.amount, U256::from(42));
        assert_eq!(event.epoch, Some(30000));
        assert_eq!(list.page, PageInfo { total_count: 1, is_total_count_clipped: false });
    }

    #[test]
    fn test_debonding_event_without_epoch() {
        let json = r#"{
            "type": "staking.escrow.debonding_start",
            "body": {
                "owner": "oasis1owner",
                "escrow": "oasis1validator",
                "debonding_shares": "500",
                "amount": "550"
            }
        }"#;

        let event: ConsensusEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.body.shares, U256::from(500));
        assert_eq!(event.body.epoch, None);
    }

    #[test]
    fn test_invalid_integer_is_rejected() {
        let json = r#"{"epoch": 1, "active_balance": "12x", "active_shares": "1"}"#;
        assert!(serde_json::from_str::<HistoryRecord>(json).is_err());
    }

    #[test]
    fn test_unread_fields_are_ignored() {
        let json = r#"{"validator": "oasis1validator", "shares": "10", "amount": "11"}"#;
        let delegation = Delegation::from(serde_json::from_str::<DelegationRecord>(json).unwrap());
        assert_eq!(delegation.shares, U256::from(10));

        let json = r#"{"id": 39088, "start_height": 22300000, "end_height": 22300599}"#;
        let epoch: Epoch = serde_json::from_str(json).unwrap();
        assert_eq!((epoch.id, epoch.start_height), (39088, 22300000));
    }

    #[test]
    fn test_block_timestamp() {
        let json = r#"{"height": 1, "timestamp": "2024-01-01T00:00:03Z"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.timestamp.to_rfc3339(), "2024-01-01T00:00:03+00:00");
    }
}

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

//! Reconstruction of delegation rewards earned with epoch-based staking validators.
//!
//! The engine starts from the delegator's present share balances, undoes the escrow events
//! of the requested period to recover the balances at the period start, then replays those
//! events checkpoint by checkpoint while sampling each validator's share price. Rewards are
//! the growth in position value net of the principal delegated or undelegated in between.

// Declare modules
pub mod accumulator;
pub mod boundaries;
pub mod clock;
pub mod engine;
pub mod epochs;
pub mod events;
pub mod format;
pub mod history;
pub mod ledger;
pub mod source;

use thiserror::Error;

// Re-export commonly used types
pub use accumulator::{earned, RewardAccumulator, RewardRow, ValidatorState};

pub use boundaries::{first_epoch_at_or_after, year_boundaries};

pub use clock::EpochClock;

pub use engine::{compute_rewards, RewardsRequest};

pub use epochs::{
    checkpoints, epochs_for_year, month_boundary_epochs, supported_years, EpochRange,
    Granularity, ParseGranularityError,
};

pub use events::{collect_events, partition_events, CollectedEvents, DelegationEvent, EventKind};

pub use format::{format_base_units, format_signed_base_units, SHARE_PRICE_PRECISION};

pub use history::{
    nearest_at_or_before, total_value, SharePrice, ValidatorHistoryCache, ValidatorHistoryEntry,
};

pub use ledger::{active_validators, present_shares, reconstruct_start_shares};

pub use source::{Delegation, RawEscrowEvent, StakingSource};

/// Number of epochs on each side of the target epoch requested by a history lookup.
pub const HISTORY_WINDOW: u64 = 10;

/// Decimal places between base units and whole tokens.
pub const BASE_UNIT_DECIMALS: u8 = 9;

#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("No epoch boundaries are known for year {year}")]
    UnsupportedPeriod { year: i32 },

    #[error("Upstream fetch failed: {0:#}")]
    Upstream(#[from] anyhow::Error),

    #[error("Reward computation was cancelled")]
    Cancelled,

    #[error("Arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),
}

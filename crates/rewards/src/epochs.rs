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

//! Calendar periods expressed as epochs.
//!
//! Month boundaries are static data produced offline by
//! [year_boundaries](crate::boundaries::year_boundaries). The engine only reads this table;
//! a year without an entry is [RewardsError::UnsupportedPeriod].

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{source::StakingSource, RewardsError};

/// First epoch of each month of a year.
///
/// Index 0 is January; index 12, present only once the year has closed, is the first
/// epoch of January of the following year.
struct YearBoundaries {
    year: i32,
    month_starts: &'static [u64],
}

const BOUNDARIES: &[YearBoundaries] = &[
    YearBoundaries {
        year: 2022,
        month_starts: &[
            10813, 11613, 12335, 13135, 13909, 14709, 15483, 16282, 17082, 17856, 18656, 19430,
            20229,
        ],
    },
    YearBoundaries {
        year: 2023,
        month_starts: &[
            20229, 21029, 21752, 22551, 23325, 24125, 24899, 25699, 26498, 27272, 28072, 28846,
            29646,
        ],
    },
    YearBoundaries {
        year: 2024,
        month_starts: &[
            29646, 30446, 31194, 31993, 32767, 33567, 34341, 35141, 35941, 36714, 37514, 38288,
            39088,
        ],
    },
    YearBoundaries {
        year: 2025,
        month_starts: &[
            39088, 39888, 40610, 41410, 42184, 42983, 43757, 44557, 45357, 46131, 46930, 47704,
            48504,
        ],
    },
    // Open year: months are appended as they start.
    YearBoundaries {
        year: 2026,
        month_starts: &[48504, 49304, 50026, 50826, 51600, 52400, 53174, 53973, 54773, 55547],
    },
];

/// Key of [month_boundary_epochs] holding the first epoch of the following year.
pub const PERIOD_END_KEY: u8 = 13;

/// Inclusive range of epochs covered by a reward computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochRange {
    pub start_epoch: u64,
    pub end_epoch: u64,
}

impl EpochRange {
    /// Whether `epoch` falls within the range.
    pub fn contains(&self, epoch: u64) -> bool {
        self.start_epoch <= epoch && epoch <= self.end_epoch
    }
}

/// Sampling density of reward checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// A single checkpoint at the end of the period
    #[default]
    Year,
    /// One checkpoint per calendar month boundary
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Month => write!(f, "month"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown granularity {0:?}; expected \"year\" or \"month\"")]
pub struct ParseGranularityError(String);

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "year" | "yearly" => Ok(Self::Year),
            "month" | "monthly" => Ok(Self::Month),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

fn lookup(year: i32) -> Result<&'static YearBoundaries, RewardsError> {
    BOUNDARIES
        .iter()
        .find(|entry| entry.year == year)
        .filter(|entry| !entry.month_starts.is_empty())
        .ok_or(RewardsError::UnsupportedPeriod { year })
}

/// Years for which boundaries are known, in ascending order.
pub fn supported_years() -> impl Iterator<Item = i32> {
    BOUNDARIES.iter().map(|entry| entry.year)
}

/// Month boundary epochs of `year`, keyed 1 (January) through 13 (January of the next
/// year). For the open year only the months that have started are present.
pub fn month_boundary_epochs(year: i32) -> Result<BTreeMap<u8, u64>, RewardsError> {
    let entry = lookup(year)?;
    Ok(entry
        .month_starts
        .iter()
        .zip(1u8..=PERIOD_END_KEY)
        .map(|(&epoch, key)| (key, epoch))
        .collect())
}

/// Resolve the epochs spanned by `year`.
///
/// Closed years end at the first epoch of the following year. The open year ends at the
/// latest epoch known upstream, which costs one live query.
pub async fn epochs_for_year<S: StakingSource + ?Sized>(
    source: &S,
    year: i32,
) -> Result<EpochRange, RewardsError> {
    let entry = lookup(year)?;
    let start_epoch = entry.month_starts[0];

    let end_epoch = match entry.month_starts.get(usize::from(PERIOD_END_KEY) - 1) {
        Some(&end) => end,
        None => {
            let latest = source.latest_epoch().await?;
            tracing::debug!("Year {year} is open; latest epoch is {latest}");
            if latest < start_epoch {
                return Err(RewardsError::UnsupportedPeriod { year });
            }
            latest
        }
    };

    Ok(EpochRange { start_epoch, end_epoch })
}

/// Ordered checkpoint epochs for a computation over `range`.
///
/// Yearly granularity samples only the end of the range. Monthly granularity samples each
/// boundary after the start and up to the end, and always finishes on the range end.
pub fn checkpoints(
    granularity: Granularity,
    range: EpochRange,
    boundaries: &BTreeMap<u8, u64>,
) -> Vec<u64> {
    match granularity {
        Granularity::Year => vec![range.end_epoch],
        Granularity::Month => {
            let mut epochs: Vec<u64> = boundaries
                .values()
                .copied()
                .filter(|&epoch| epoch > range.start_epoch && epoch <= range.end_epoch)
                .collect();
            epochs.sort_unstable();
            epochs.dedup();
            if epochs.last() != Some(&range.end_epoch) {
                epochs.push(range.end_epoch);
            }
            epochs
        }
    }
}

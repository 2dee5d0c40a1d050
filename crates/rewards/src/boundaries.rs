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

//! Offline generation of the month boundary table in [crate::epochs].
//!
//! Each boundary costs a binary search over epoch start times, i.e. dozens of sequential
//! round trips, so this only runs from the maintenance command and never during a reward
//! computation.

use chrono::{DateTime, TimeZone, Utc};

use crate::{clock::EpochClock, source::StakingSource, RewardsError};

/// Smallest epoch in `[lo, hi]` starting at or after `target`, or `None` if `hi` starts
/// before it.
pub async fn first_epoch_at_or_after<S: StakingSource + ?Sized>(
    clock: &mut EpochClock<'_, S>,
    target: DateTime<Utc>,
    lo: u64,
    hi: u64,
) -> Result<Option<u64>, RewardsError> {
    if lo > hi || clock.start_time(hi).await? < target {
        return Ok(None);
    }

    let (mut lo, mut hi) = (lo, hi);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if clock.start_time(mid).await? >= target {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(Some(lo))
}

/// First epoch of every month of `year` that has started, followed by the first epoch of
/// the next year once it has started. The search begins at `search_from`.
pub async fn year_boundaries<S: StakingSource + ?Sized>(
    source: &S,
    year: i32,
    search_from: u64,
) -> Result<Vec<u64>, RewardsError> {
    let latest = source.latest_epoch().await?;
    let mut clock = EpochClock::new(source);
    let mut boundaries = Vec::with_capacity(13);
    let mut lo = search_from;

    for month in 1..=13u32 {
        let (target_year, target_month) = if month == 13 { (year + 1, 1) } else { (year, month) };
        let Some(target) =
            Utc.with_ymd_and_hms(target_year, target_month, 1, 0, 0, 0).single()
        else {
            break;
        };

        match first_epoch_at_or_after(&mut clock, target, lo, latest).await? {
            Some(epoch) => {
                tracing::info!("{target_year}-{target_month:02} starts at epoch {epoch}");
                boundaries.push(epoch);
                lo = epoch;
            }
            None => {
                tracing::info!("{target_year}-{target_month:02} has not started by epoch {latest}");
                break;
            }
        }
    }

    Ok(boundaries)
}

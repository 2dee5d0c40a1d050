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

use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::{source::StakingSource, RewardsError};

/// Resolves epochs to the timestamp of their first block, memoized for one computation.
pub struct EpochClock<'a, S: ?Sized> {
    source: &'a S,
    start_times: HashMap<u64, DateTime<Utc>>,
}

impl<'a, S: StakingSource + ?Sized> EpochClock<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source, start_times: HashMap::new() }
    }

    /// Wall-clock start of `epoch`.
    pub async fn start_time(&mut self, epoch: u64) -> Result<DateTime<Utc>, RewardsError> {
        if let Some(time) = self.start_times.get(&epoch) {
            return Ok(*time);
        }

        let height = self
            .source
            .epoch_start_height(epoch)
            .await
            .with_context(|| format!("Failed to fetch start height of epoch {epoch}"))?;
        let time = self
            .source
            .block_timestamp(height)
            .await
            .with_context(|| format!("Failed to fetch timestamp of block {height}"))?;

        self.start_times.insert(epoch, time);
        Ok(time)
    }
}

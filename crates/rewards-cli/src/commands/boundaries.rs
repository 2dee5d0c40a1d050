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

use clap::Args;
use staking_rewards::{month_boundary_epochs, year_boundaries};

use crate::config::GlobalConfig;

/// Command to search the first epoch of every month of a year.
///
/// This issues a binary search per month against the indexer and is meant for maintaining
/// the built-in boundary table, not for regular use.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct FindBoundaries {
    /// Calendar year to search.
    #[clap(long)]
    pub year: i32,
    /// Epoch to start searching from. Defaults to the end of the previous year when it is
    /// known, otherwise to epoch 0.
    #[clap(long)]
    pub search_from: Option<u64>,
}

impl FindBoundaries {
    /// Run the [FindBoundaries] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let search_from = self.search_from.unwrap_or_else(|| default_search_from(self.year));
        let client = global_config.build_client()?;

        tracing::info!("Searching month boundaries of {} from epoch {search_from}", self.year);
        let found = year_boundaries(&client, self.year, search_from).await?;

        if let Ok(known) = month_boundary_epochs(self.year) {
            let known: Vec<u64> = known.into_values().collect();
            if known != found {
                tracing::warn!("Found boundaries differ from the built-in table: {known:?}");
            }
        }

        let epochs: Vec<String> = found.iter().map(|epoch| epoch.to_string()).collect();
        println!(
            "YearBoundaries {{ year: {}, month_starts: &[{}] }},",
            self.year,
            epochs.join(", ")
        );
        Ok(())
    }
}

/// First epoch of `year` according to the table of the previous year.
fn default_search_from(year: i32) -> u64 {
    month_boundary_epochs(year - 1)
        .ok()
        .and_then(|boundaries| boundaries.values().last().copied())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_search_from() {
        assert_eq!(default_search_from(2025), 39088);
        assert_eq!(default_search_from(2019), 0);
    }
}

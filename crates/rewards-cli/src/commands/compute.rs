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

use std::{fs::File, io, path::PathBuf};

use alloy_primitives::I256;
use anyhow::Context;
use clap::Args;
use staking_rewards::{
    compute_rewards, format_signed_base_units, supported_years, Granularity, RewardRow,
    RewardsRequest,
};
use tokio_util::sync::CancellationToken;

use crate::{config::GlobalConfig, output::write_rows};

/// Command to compute the rewards of a delegator.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct ComputeRewards {
    /// Delegator address to compute rewards for.
    pub address: String,
    /// Calendar year to compute rewards for.
    #[clap(long)]
    pub year: i32,
    /// Sampling granularity: one row per validator for the year, or one per month.
    #[clap(long, default_value = "year")]
    pub granularity: Granularity,
    /// File to write the CSV to. Defaults to stdout.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl ComputeRewards {
    /// Run the [ComputeRewards] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        if !supported_years().any(|year| year == self.year) {
            let years: Vec<String> = supported_years().map(|year| year.to_string()).collect();
            tracing::warn!(
                "No epoch boundaries for {}; supported years are {}",
                self.year,
                years.join(", ")
            );
        }

        let client = global_config.build_client()?;
        let request = RewardsRequest {
            address: self.address.clone(),
            year: self.year,
            granularity: self.granularity,
        };

        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; cancelling the computation");
                    cancel.cancel();
                }
            }
        });
        let result = compute_rewards(&client, &request, &cancel).await;
        interrupt.abort();
        let rows = result.with_context(|| {
            format!(
                "Failed to compute {} rewards of {} for {}",
                self.granularity, self.address, self.year
            )
        })?;

        let total = total_rewards(&rows).context("Total rewards overflow")?;
        tracing::info!(
            "{} rows, total rewards {} for {} in {}",
            rows.len(),
            format_signed_base_units(total),
            self.address,
            self.year
        );

        match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_rows(file, &rows)?;
                tracing::info!("Wrote {}", path.display());
            }
            None => write_rows(io::stdout().lock(), &rows)?,
        }

        Ok(())
    }
}

/// Sum of the rewards of `rows`, or `None` on overflow.
fn total_rewards(rows: &[RewardRow]) -> Option<I256> {
    rows.iter().try_fold(I256::ZERO, |sum, row| sum.checked_add(row.rewards))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use chrono::{TimeZone, Utc};
    use staking_rewards::SharePrice;

    use super::*;

    fn row(rewards: I256) -> RewardRow {
        RewardRow {
            start_epoch: 29646,
            end_epoch: 39088,
            start_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            validator: "oasis1validator".to_string(),
            shares: U256::ZERO,
            share_price: SharePrice { active_balance: U256::ZERO, active_shares: U256::ZERO },
            delegation_value: U256::ZERO,
            rewards,
        }
    }

    #[test]
    fn test_total_rewards() {
        let rows = [row(I256::try_from(5).unwrap()), row(I256::try_from(-2).unwrap())];
        assert_eq!(total_rewards(&rows), Some(I256::try_from(3).unwrap()));
        assert_eq!(total_rewards(&[]), Some(I256::ZERO));
    }

    #[test]
    fn test_total_rewards_overflow() {
        assert_eq!(total_rewards(&[row(I256::MAX), row(I256::ONE)]), None);
    }
}

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

//! Commands of the staking rewards CLI.

mod boundaries;
mod compute;
mod merge;

pub use boundaries::FindBoundaries;
pub use compute::ComputeRewards;
pub use merge::MergeYearlyFiles;

use clap::Subcommand;

use crate::config::GlobalConfig;

/// Top level commands.
#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Compute the rewards earned by a delegator during a year and write them as CSV.
    Compute(ComputeRewards),
    /// Merge per-year CSV files into a single file.
    Merge(MergeYearlyFiles),
    /// Search the month boundary epochs of a year against the indexer.
    Boundaries(FindBoundaries),
}

impl Command {
    /// Run the command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        match self {
            Self::Compute(cmd) => cmd.run(global_config).await,
            Self::Merge(cmd) => cmd.run(),
            Self::Boundaries(cmd) => cmd.run(global_config).await,
        }
    }
}

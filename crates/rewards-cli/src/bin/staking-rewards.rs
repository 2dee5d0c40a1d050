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

use anyhow::Result;
use clap::Parser;
use staking_rewards_cli::{commands::Command, config::GlobalConfig};

/// Compute delegation rewards from the Nexus staking indexer.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[clap(flatten)]
    config: GlobalConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.config.init_tracing();

    if let Err(err) = cli.command.run(&cli.config).await {
        tracing::error!("Command failed: {err:?}");
        return Err(err);
    }
    Ok(())
}

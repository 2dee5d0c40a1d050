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

use std::path::PathBuf;

use clap::Args;

use crate::output::merge_yearly_files;

/// Command to merge `<PREFIX>_<YYYY>.csv` files into `<PREFIX>.csv`.
#[derive(Args, Clone, Debug)]
pub struct MergeYearlyFiles {
    /// Path prefix of the yearly files, e.g. `out/rewards` for `out/rewards_2024.csv`.
    pub prefix: PathBuf,
}

impl MergeYearlyFiles {
    /// Run the [MergeYearlyFiles] command.
    pub fn run(&self) -> anyhow::Result<()> {
        let (output, inputs) = merge_yearly_files(&self.prefix)?;
        println!("Merged {} files into {}", inputs.len(), output.display());
        Ok(())
    }
}

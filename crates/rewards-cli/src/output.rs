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

//! CSV output of reward rows, and merging of per-year CSV files.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::SecondsFormat;
use serde::Serialize;
use staking_rewards::{
    format_base_units, format_signed_base_units, RewardRow, SHARE_PRICE_PRECISION,
};

pub const CSV_HEADER: [&str; 9] = [
    "start_epoch",
    "end_epoch",
    "start_timestamp",
    "end_timestamp",
    "validator",
    "shares",
    "share_price",
    "delegation_value",
    "rewards",
];

/// A [RewardRow] as written to CSV. Field order matches [CSV_HEADER].
#[derive(Debug, Serialize)]
struct CsvRecord {
    start_epoch: u64,
    end_epoch: u64,
    start_timestamp: String,
    end_timestamp: String,
    validator: String,
    shares: String,
    share_price: String,
    delegation_value: String,
    rewards: String,
}

impl From<&RewardRow> for CsvRecord {
    fn from(row: &RewardRow) -> Self {
        Self {
            start_epoch: row.start_epoch,
            end_epoch: row.end_epoch,
            start_timestamp: row.start_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            end_timestamp: row.end_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            validator: row.validator.clone(),
            shares: row.shares.to_string(),
            share_price: row.share_price.to_decimal_string(SHARE_PRICE_PRECISION),
            delegation_value: format_base_units(row.delegation_value),
            rewards: format_signed_base_units(row.rewards),
        }
    }
}

/// Write `rows` as CSV. The header is written even when there are no rows.
pub fn write_rows<W: Write>(writer: W, rows: &[RewardRow]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(CSV_HEADER).context("Failed to write CSV header")?;
    for row in rows {
        csv.serialize(CsvRecord::from(row)).context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Year in a file name ending in `_<YYYY>.csv`.
fn file_year(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".csv")?;
    let (_, year) = stem.rsplit_once('_')?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// Files named `<prefix>_20*.csv`, ordered by the year at the end of their name. Files
/// without a trailing year sort last.
pub fn yearly_files(prefix: &Path) -> Result<Vec<PathBuf>> {
    let dir = match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = prefix
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid prefix {}", prefix.display()))?;
    let pattern = format!("{name}_20");

    let mut files = Vec::new();
    for entry in
        fs::read_dir(&dir).with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if file_name.starts_with(&pattern) && file_name.ends_with(".csv") {
            let year = file_year(&file_name).unwrap_or(u32::MAX);
            files.push((year, file_name, entry.path()));
        }
    }

    files.sort();
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Concatenate the yearly CSV files of `prefix` into `<prefix>.csv`, keeping the header of
/// the first file only. Returns the merged file and its inputs.
pub fn merge_yearly_files(prefix: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    let files = yearly_files(prefix)?;
    if files.is_empty() {
        bail!("No matching files found for prefix: {}", prefix.display());
    }

    let output = PathBuf::from(format!("{}.csv", prefix.display()));
    let out_file =
        File::create(&output).with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out_file);
    let mut header: Option<csv::StringRecord> = None;

    for file in &files {
        tracing::info!("Processing {}", file.display());
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
        let file_header = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", file.display()))?
            .clone();

        match &header {
            None => {
                writer.write_record(&file_header)?;
                header = Some(file_header);
            }
            Some(first) if *first != file_header => {
                tracing::warn!("Header of {} differs from the first file", file.display());
            }
            Some(_) => {}
        }

        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to read a row of {}", file.display()))?;
            writer.write_record(&record)?;
        }
    }

    writer.flush().with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Merged into {}", output.display());
    Ok((output, files))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{I256, U256};
    use chrono::{TimeZone, Utc};
    use staking_rewards::SharePrice;

    use super::*;

    fn row(rewards: i64) -> RewardRow {
        RewardRow {
            start_epoch: 29646,
            end_epoch: 30446,
            start_timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 11).unwrap(),
            end_timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 1, 5).unwrap(),
            validator: "oasis1validator".to_string(),
            shares: U256::from(1_000_000_000_000u64),
            share_price: SharePrice {
                active_balance: U256::from(3u64),
                active_shares: U256::from(2u64),
            },
            delegation_value: U256::from(1_500_000_000_000u64),
            rewards: I256::try_from(rewards).unwrap(),
        }
    }

    #[test]
    fn test_write_rows() {
        let mut out = Vec::new();
        write_rows(&mut out, &[row(2_500_000_000), row(-1)]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(
            lines[1],
            "29646,30446,2024-01-01T00:02:11Z,2024-02-01T00:01:05Z,oasis1validator,\
             1000000000000,1.500000000000000000,1500.000000000,2.500000000"
        );
        assert!(lines[2].ends_with(",-0.000000001"));
    }

    #[test]
    fn test_write_no_rows() {
        let mut out = Vec::new();
        write_rows(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", CSV_HEADER.join(",")));
    }

    #[test]
    fn test_file_year() {
        assert_eq!(file_year("rewards_2023.csv"), Some(2023));
        assert_eq!(file_year("rewards_x_2024.csv"), Some(2024));
        assert_eq!(file_year("rewards_20.csv"), None);
        assert_eq!(file_year("rewards_2023.txt"), None);
    }

    #[test]
    fn test_merge_in_year_order() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("rewards");
        fs::write(dir.path().join("rewards_2023.csv"), "a,b\n3,4\n").unwrap();
        fs::write(dir.path().join("rewards_2022.csv"), "a,b\n1,2\n").unwrap();
        fs::write(dir.path().join("other_2022.csv"), "a,b\n9,9\n").unwrap();

        let (output, inputs) = merge_yearly_files(&prefix).unwrap();

        assert_eq!(inputs.len(), 2);
        assert_eq!(fs::read_to_string(output).unwrap(), "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn test_merge_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_yearly_files(&dir.path().join("rewards")).unwrap_err();
        assert!(err.to_string().contains("No matching files"));
    }
}

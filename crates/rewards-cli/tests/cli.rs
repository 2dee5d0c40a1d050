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

//! Integration tests of the staking-rewards binary.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ADDRESS: &str = "oasis1owner";
const VALIDATOR: &str = "oasis1validator";

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("staking-rewards").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("NEXUS_URL").env_remove("LOG_LEVEL");
    cmd
}

#[test]
fn test_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Usage:"))
        .stdout(contains("compute"))
        .stdout(contains("merge"))
        .stdout(contains("boundaries"));
}

#[test]
fn test_invalid_granularity() {
    cli()
        .args(["compute", ADDRESS, "--year", "2024", "--granularity", "week"])
        .assert()
        .failure()
        .stderr(contains("unknown granularity"));
}

#[test]
fn test_unsupported_year_writes_empty_csv() {
    // Resolved without contacting the indexer.
    cli()
        .args(["compute", ADDRESS, "--year", "2019", "--nexus-url", "http://127.0.0.1:9/v1/"])
        .assert()
        .success()
        .stdout("start_epoch,end_epoch,start_timestamp,end_timestamp,validator,shares,share_price,delegation_value,rewards\n")
        .stderr(contains("No epoch boundaries for 2019"));
}

#[test]
fn test_merge() {
    let dir = tempfile::tempdir().unwrap();
    let header = "start_epoch,end_epoch,rewards\n";
    fs::write(dir.path().join("out_2024.csv"), format!("{header}29646,39088,2\n")).unwrap();
    fs::write(dir.path().join("out_2023.csv"), format!("{header}20229,29646,1\n")).unwrap();
    let prefix = dir.path().join("out");

    cli()
        .arg("merge")
        .arg(&prefix)
        .assert()
        .success()
        .stdout(contains("Merged 2 files"));

    let merged = fs::read_to_string(dir.path().join("out.csv")).unwrap();
    assert_eq!(merged, format!("{header}20229,29646,1\n29646,39088,2\n"));
}

#[test]
fn test_merge_without_files() {
    let dir = tempfile::tempdir().unwrap();

    cli()
        .arg("merge")
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .stderr(contains("No matching files found"));
}

async fn mount_json(server: &MockServer, url_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compute_yearly_against_indexer() {
    let server = MockServer::start().await;
    let history_path = format!("/v1/consensus/validators/{VALIDATOR}/history");

    mount_json(
        &server,
        "/v1/consensus/events",
        json!({"events": [], "total_count": 0, "is_total_count_clipped": false}),
    )
    .await;
    mount_json(
        &server,
        &format!("/v1/consensus/accounts/{ADDRESS}/delegations"),
        json!({
            "delegations": [{"validator": VALIDATOR, "shares": "1000000000000", "amount": "0"}],
            "total_count": 1,
            "is_total_count_clipped": false
        }),
    )
    .await;
    for (epoch, balance) in [(29646u64, "1000000000000"), (39088, "1100000000000")] {
        Mock::given(method("GET"))
            .and(path(history_path.as_str()))
            .and(query_param("from", (epoch - 10).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "history": [{"epoch": epoch, "active_balance": balance, "active_shares": "1000000000000"}],
                "total_count": 1,
                "is_total_count_clipped": false
            })))
            .mount(&server)
            .await;
    }
    for (epoch, height, timestamp) in
        [(29646u64, 16817000u64, "2024-01-01T00:00:30Z"), (39088, 22300000, "2025-01-01T00:01:10Z")]
    {
        mount_json(
            &server,
            &format!("/v1/consensus/epochs/{epoch}"),
            json!({"id": epoch, "start_height": height}),
        )
        .await;
        mount_json(
            &server,
            &format!("/v1/consensus/blocks/{height}"),
            json!({"height": height, "timestamp": timestamp}),
        )
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out_2024.csv");
    cli()
        .args(["compute", ADDRESS, "--year", "2024", "--output"])
        .arg(&output)
        .arg("--nexus-url")
        .arg(format!("{}/v1/", server.uri()))
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "29646,39088,2024-01-01T00:00:30Z,2025-01-01T00:01:10Z,oasis1validator,1000000000000,\
         1.100000000000000000,1100.000000000,100.000000000"
    );
}

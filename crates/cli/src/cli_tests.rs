// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[test]
fn parses_required_flags() {
    let cli = Cli::parse_from(["oja-agent", "--farm-id", "farm-1", "--fleet-id", "fleet-1"]);
    assert_eq!(cli.farm_id, "farm-1");
    assert_eq!(cli.fleet_id, "fleet-1");
    assert_eq!(cli.state_dir, PathBuf::from("/var/lib/oja-agent"));
    assert_eq!(cli.log_level, LogLevel::Info);
}

#[test]
fn missing_farm_id_is_an_error() {
    let result = Cli::try_parse_from(["oja-agent", "--fleet-id", "fleet-1"]);
    assert!(result.is_err());
}

#[test]
fn overrides_state_dir_and_log_level() {
    let cli = Cli::parse_from([
        "oja-agent",
        "--farm-id",
        "farm-1",
        "--fleet-id",
        "fleet-1",
        "--state-dir",
        "/tmp/oja",
        "--log-level",
        "debug",
    ]);
    assert_eq!(cli.state_dir, PathBuf::from("/tmp/oja"));
    assert_eq!(cli.log_level, LogLevel::Debug);
}

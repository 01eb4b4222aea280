//! Load guard tests for preservation-config.
// crates/preservation-config/tests/load_validation.rs
// =============================================================================
// Module: Load Validation Tests
// Description: Validate file size, encoding, and parse guards on load.
// Purpose: Ensure config loading fails closed on hostile or malformed input.
// =============================================================================

use std::fs;

use preservation_config::ConfigError;
use preservation_config::MAX_CONFIG_FILE_SIZE;
use preservation_config::PreservationConfig;

type TestResult = Result<(), String>;

fn expect_error(result: Result<PreservationConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected load failure".to_string()),
    }
}

#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("preservation.toml");
    fs::write(&path, "[logging]\nlevel = \"debug\"\n").map_err(|err| err.to_string())?;
    let config = PreservationConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.logging.level != "debug" {
        return Err(format!("unexpected level {}", config.logging.level));
    }
    Ok(())
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    expect_error(PreservationConfig::load(Some(&path)), "config io error")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(MAX_CONFIG_FILE_SIZE));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    expect_error(PreservationConfig::load(Some(&path)), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    expect_error(PreservationConfig::load(Some(&path)), "config file must be utf-8")
}

#[test]
fn load_reports_parse_errors() -> TestResult {
    expect_error(PreservationConfig::from_bytes(b"[store\n"), "config parse error")
}

#[test]
fn load_runs_validation() -> TestResult {
    expect_error(
        PreservationConfig::from_bytes(b"[store]\ntype = \"sqlite\"\n"),
        "sqlite store requires path",
    )
}

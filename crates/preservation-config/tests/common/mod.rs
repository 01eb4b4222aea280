// crates/preservation-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for preservation-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use preservation_config::ConfigError;
use preservation_config::PreservationConfig;

/// Parses a TOML string into a `PreservationConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<PreservationConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<PreservationConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a config with a valid storage section.
pub fn config_with_storage() -> Result<PreservationConfig, toml::de::Error> {
    config_from_toml(
        r#"
[storage]
base_url = "https://archive.example.org/api/"

[storage.read]
username = "reader"
password = "read-secret"

[storage.read_write]
username = "writer"
password = "write-secret"
"#,
    )
}

/// Checks that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

//! Config load validation tests for microcks-harness-config.
// crates/microcks-harness-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, parse).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use microcks_harness_config::ConfigError;
use microcks_harness_config::HarnessConfig;
use microcks_harness_core::HttpClientSettings;
use microcks_harness_core::OrchestrationPolicy;
use tempfile::NamedTempFile;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<HarnessConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(HarnessConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        HarnessConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'#'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(HarnessConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(HarnessConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match HarnessConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("expected missing config to fail".to_string()),
    }
}

#[test]
fn load_reports_malformed_toml_as_parse() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[backend\nname = ").map_err(|err| err.to_string())?;
    assert_invalid(HarnessConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn empty_file_uses_reference_defaults() -> TestResult {
    let file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let config = HarnessConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let policy = config.policy();

    if config.backend.name != "microcks" || config.backend.url != "http://localhost:8080" {
        return Err("unexpected backend defaults".to_string());
    }
    if policy.readiness.startup_marker != "Started MicrocksApplication"
        || policy.readiness.health_attempts != 3
        || policy.readiness.health_delay != Duration::from_millis(100)
    {
        return Err("unexpected readiness defaults".to_string());
    }
    if policy.retry.max_attempts != 5 || policy.retry.delay != Duration::from_millis(100) {
        return Err("unexpected retry defaults".to_string());
    }
    if policy.polling.grace != Duration::from_secs(1)
        || policy.polling.initial_delay != Duration::from_millis(100)
        || policy.polling.interval != Duration::from_millis(200)
    {
        return Err("unexpected polling defaults".to_string());
    }
    let settings = config.client_settings();
    if settings.connect_timeout != Duration::from_secs(5)
        || settings.request_timeout != Duration::from_secs(30)
    {
        return Err("unexpected client defaults".to_string());
    }
    if !config.artifacts.is_empty() {
        return Err("artifacts should default to empty".to_string());
    }
    Ok(())
}

#[test]
fn omitted_sections_match_core_policy_defaults() -> TestResult {
    let config = HarnessConfig::from_toml("", Path::new(".")).map_err(|err| err.to_string())?;

    if config.policy() != OrchestrationPolicy::default() {
        return Err("config defaults drifted from core policy defaults".to_string());
    }
    if config.client_settings() != HttpClientSettings::default() {
        return Err("config defaults drifted from client settings defaults".to_string());
    }
    Ok(())
}

#[test]
fn load_resolves_base_dir_from_config_location() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("microcks-harness.toml");
    std::fs::write(&path, "[backend]\nname = \"pastries\"\n").map_err(|err| err.to_string())?;

    let config = HarnessConfig::load(Some(&path)).map_err(|err| err.to_string())?;

    if config.base_dir != dir.path() {
        return Err(format!("base dir {} did not match", config.base_dir.display()));
    }
    if config.resolve_artifact_path("specs/api.yaml") != dir.path().join("specs/api.yaml") {
        return Err("relative artifact path not resolved against config dir".to_string());
    }
    Ok(())
}

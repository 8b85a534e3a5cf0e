// crates/microcks-harness-cli/src/main.rs
// ============================================================================
// Module: Microcks Harness CLI Entry Point
// Description: Command dispatcher over the orchestration facade.
// Purpose: Check health, synchronize artifacts, and run contract tests from a shell.
// Dependencies: clap, microcks-harness-config, microcks-harness-core, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `microcks-harness` loads `microcks-harness.toml`, builds one facade for the
//! configured backend, and runs a single command against it. Logs go to
//! stderr; command output goes to stdout. Ctrl-C cancels the running command.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use microcks_harness_config::HarnessConfig;
use microcks_harness_core::ArtifactSet;
use microcks_harness_core::CancellationToken;
use microcks_harness_core::Header;
use microcks_harness_core::OrchestrationFacade;
use microcks_harness_core::ReadinessState;
use microcks_harness_core::SyncReport;
use microcks_harness_core::TestRequest;
use microcks_harness_core::TestRunnerType;
use microcks_harness_core::on_ready;
use serde::Serialize;
use thiserror::Error;
use time::Date;
use time::Month;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "MICROCKS_HARNESS_LOG";
/// Filter used when the environment variable is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "microcks-harness", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `MICROCKS_HARNESS_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue one health call against the backend.
    Health,
    /// Wait for readiness, then push the configured artifacts once.
    Sync,
    /// Run one conformance test and print the result.
    Test(TestCommand),
    /// Print the daily invocation count of a mocked service.
    Invocations(InvocationsCommand),
}

/// Arguments for `test`.
#[derive(Args, Debug)]
struct TestCommand {
    /// Service under test as `name:version`.
    #[arg(long, value_name = "ID")]
    service_id: String,
    /// Runner type, e.g. `OPEN_API_SCHEMA`.
    #[arg(long, value_name = "RUNNER")]
    runner: TestRunnerType,
    /// Endpoint of the implementation under test.
    #[arg(long, value_name = "URL")]
    endpoint: String,
    /// Backend-side execution timeout in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 0)]
    timeout_ms: u64,
    /// Restrict the run to an operation; repeatable.
    #[arg(long = "operation", value_name = "OP")]
    operations: Vec<String>,
    /// Header for one operation as `OP=Name:v1,v2`; repeatable.
    #[arg(long = "header", value_name = "SPEC", value_parser = parse_operation_header)]
    headers: Vec<OperationHeader>,
    /// Also print the exchanges captured for this operation.
    #[arg(long = "messages", value_name = "OP")]
    messages: Option<String>,
}

/// Arguments for `invocations`.
#[derive(Args, Debug)]
struct InvocationsCommand {
    /// Mocked service name.
    #[arg(long, value_name = "NAME")]
    service: String,
    /// Mocked service version.
    #[arg(long, value_name = "VERSION")]
    version: String,
    /// Day as `YYYYMMDD`; the backend defaults to today.
    #[arg(long, value_name = "YYYYMMDD", value_parser = parse_day)]
    day: Option<Date>,
}

/// Header bound to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OperationHeader {
    /// Operation name.
    operation: String,
    /// Header to forward.
    header: Header,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// JSON report printed by `sync`.
#[derive(Serialize)]
struct SyncOutput<'a> {
    /// Backend name.
    backend: &'a str,
    /// Terminal readiness state.
    readiness: &'static str,
    /// Synchronization outcome.
    report: &'a SyncReport,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a display message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;
    let config = HarnessConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Commands::Health => command_health(&config, &cancel).await,
        Commands::Sync => command_sync(&config, &cancel).await,
        Commands::Test(command) => command_test(&config, &command, &cancel).await,
        Commands::Invocations(command) => command_invocations(&config, &command, &cancel).await,
    }
}

/// Installs the stderr log subscriber.
fn init_tracing(json: bool) -> CliResult<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).try_init()
    };
    result.map_err(|err| CliError::new(format!("failed to install logger: {err}")))
}

/// Cancels the caller token on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

/// Builds the facade for the configured backend.
fn build_facade(config: &HarnessConfig, artifacts: ArtifactSet) -> CliResult<OrchestrationFacade> {
    on_ready(&config.backend.name, &config.backend.url, artifacts, config.facade_options())
        .map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs `health`.
async fn command_health(config: &HarnessConfig, cancel: &CancellationToken) -> CliResult<ExitCode> {
    let facade = build_facade(config, ArtifactSet::new())?;
    let healthy = facade
        .is_healthy(cancel)
        .await
        .map_err(|err| CliError::new(format!("health check failed: {err}")))?;
    write_stdout_line(if healthy { "healthy" } else { "unhealthy" })?;
    Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Runs `sync`.
async fn command_sync(config: &HarnessConfig, cancel: &CancellationToken) -> CliResult<ExitCode> {
    let artifacts = config.artifact_set().map_err(|err| CliError::new(err.to_string()))?;
    let facade = build_facade(config, artifacts)?;
    let readiness = facade
        .wait_until_ready(None::<tokio_stream::Empty<String>>, cancel)
        .await
        .map_err(|err| CliError::new(err.to_string()))?;
    if readiness == ReadinessState::Unhealthy {
        warn!(backend = %facade.name(), "backend not confirmed healthy, synchronizing anyway");
    }
    let report = facade
        .synchronize_artifacts(cancel)
        .await
        .map_err(|err| CliError::new(format!("synchronization failed: {err}")))?;
    info!(backend = %facade.name(), artifacts = report.artifacts.len(), "synchronization finished");
    write_json(&SyncOutput {
        backend: facade.name().as_str(),
        readiness: readiness.as_str(),
        report: &report,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Runs `test`.
async fn command_test(
    config: &HarnessConfig,
    command: &TestCommand,
    cancel: &CancellationToken,
) -> CliResult<ExitCode> {
    let facade = build_facade(config, ArtifactSet::new())?;
    let request = build_test_request(command);
    let result = facade
        .run_test(&request, cancel)
        .await
        .map_err(|err| CliError::new(format!("test run failed: {err}")))?;
    write_json(&result)?;
    if let Some(operation) = &command.messages {
        let pairs = facade
            .get_messages(&result, operation, cancel)
            .await
            .map_err(|err| CliError::new(format!("message fetch failed: {err}")))?;
        write_json(&pairs)?;
    }
    Ok(if result.success && !result.in_progress { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Runs `invocations`.
async fn command_invocations(
    config: &HarnessConfig,
    command: &InvocationsCommand,
    cancel: &CancellationToken,
) -> CliResult<ExitCode> {
    let facade = build_facade(config, ArtifactSet::new())?;
    let count = facade
        .invocation_count(&command.service, &command.version, command.day, cancel)
        .await
        .map_err(|err| CliError::new(format!("metrics query failed: {err}")))?;
    write_stdout_line(&count.to_string())?;
    Ok(ExitCode::SUCCESS)
}

/// Assembles a test request from parsed arguments.
fn build_test_request(command: &TestCommand) -> TestRequest {
    let mut request =
        TestRequest::new(command.service_id.as_str(), command.runner, command.endpoint.as_str())
            .with_timeout(Duration::from_millis(command.timeout_ms));
    if !command.operations.is_empty() {
        request = request.with_filtered_operations(&command.operations);
    }
    for binding in &command.headers {
        request = request.with_operation_header(binding.operation.as_str(), binding.header.clone());
    }
    request
}

// ============================================================================
// SECTION: Argument Parsers
// ============================================================================

/// Parses `OP=Name:v1,v2` into an operation-bound header.
fn parse_operation_header(raw: &str) -> Result<OperationHeader, String> {
    let (operation, header) =
        raw.split_once('=').ok_or_else(|| format!("expected OP=Name:values, got '{raw}'"))?;
    let (name, values) = header
        .split_once(':')
        .ok_or_else(|| format!("expected Name:values after '=', got '{header}'"))?;
    let operation = operation.trim();
    let name = name.trim();
    if operation.is_empty() || name.is_empty() {
        return Err(format!("operation and header name must be non-empty in '{raw}'"));
    }
    let values =
        values.split(',').map(str::trim).filter(|value| !value.is_empty()).collect::<Vec<_>>();
    if values.is_empty() {
        return Err(format!("header '{name}' needs at least one value"));
    }
    Ok(OperationHeader {
        operation: operation.to_string(),
        header: Header::new(name, values),
    })
}

/// Parses a `YYYYMMDD` day.
fn parse_day(raw: &str) -> Result<Date, String> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(format!("expected YYYYMMDD, got '{raw}'"));
    }
    let year = raw[0..4].parse::<i32>().map_err(|err| err.to_string())?;
    let month = raw[4..6].parse::<u8>().map_err(|err| err.to_string())?;
    let day = raw[6..8].parse::<u8>().map_err(|err| err.to_string())?;
    let month = Month::try_from(month).map_err(|err| err.to_string())?;
    Date::from_calendar_date(year, month, day).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    write_stdout_line(&text)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

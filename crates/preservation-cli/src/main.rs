// crates/preservation-cli/src/main.rs
// ============================================================================
// Module: Preservation CLI Entry Point
// Description: Command dispatcher for fixity, digest, storage, and config tasks.
// Purpose: Run integrity checks and archival storage operations from a shell.
// Dependencies: clap, preservation-config, preservation-fixity, preservation-storage, tracing
// ============================================================================

//! ## Overview
//! The `preservation` binary verifies package fixity under a per-run policy,
//! computes and checks single-file digests, drives the archival storage
//! service, and validates configuration. Inputs are untrusted: JSON inputs
//! are read under a size limit and configuration fails closed.
//!
//! Exit codes: `0` on success, `1` on failure, and `2` when a fixity check
//! escalates for human resolution.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod storage;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use preservation_config::PreservationConfig;
use preservation_config::StoreConfig;
use preservation_core::DigestError;
use preservation_core::DigestOutcome;
use preservation_core::DigestRegistry;
use preservation_core::DigestVerdict;
use preservation_core::InMemoryIssueStore;
use preservation_core::Issue;
use preservation_core::IssueStore;
use preservation_core::NoFormats;
use preservation_core::ToolRef;
use preservation_core::WorkflowId;
use preservation_fixity::FixityCheckRun;
use preservation_fixity::FixityChecker;
use preservation_fixity::FixityContext;
use preservation_fixity::FixityFault;
use preservation_fixity::FixityVerifier;
use preservation_fixity::IssuePolicyEngine;
use preservation_fixity::MetsParser;
use preservation_fixity::PackageConvention;
use preservation_fixity::RunRequest;
use preservation_store_sqlite::SqlitePreservationStore;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::storage::StorageCommand;
use crate::storage::command_storage;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a policy JSON input.
const MAX_POLICY_BYTES: usize = 1024 * 1024;
/// Environment variable holding the log filter.
const LOG_ENV: &str = "PRESERVATION_LOG";
/// Log level used before any configuration is loaded.
const DEFAULT_LOG_LEVEL: &str = "info";
/// Tool name recorded on issues raised by this binary.
const TOOL_NAME: &str = "preservation-cli";
/// Exit code returned when a fixity check escalates.
const ESCALATION_EXIT: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "preservation", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify package fixity and apply the issue policy.
    Verify(VerifyCommand),
    /// Compute or check the digest of a single file.
    Digest(DigestCommand),
    /// Archival storage operations.
    Storage {
        /// Selected storage subcommand.
        #[command(subcommand)]
        command: StorageCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a preservation configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to preservation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Package conventions selectable on the command line.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum ConventionArg {
    /// METS `fileSec` manifest.
    Mets,
    /// BagIt manifests.
    Bagit,
}

impl From<ConventionArg> for PackageConvention {
    fn from(value: ConventionArg) -> Self {
        match value {
            ConventionArg::Mets => Self::Mets,
            ConventionArg::Bagit => Self::Bagit,
        }
    }
}

/// Arguments for fixity verification.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Package root directory.
    #[arg(long, value_name = "DIR")]
    root: PathBuf,
    /// Workflow run the issues are recorded under.
    #[arg(long, value_name = "ID")]
    workflow: String,
    /// Manifest convention (read from the policy when omitted).
    #[arg(long, value_enum)]
    convention: Option<ConventionArg>,
    /// Regular expression matching the METS file's package-relative path.
    #[arg(long, value_name = "REGEX")]
    metadata_pattern: Option<String>,
    /// Path to the run policy JSON (`fixityCheck/<i>/<option>`).
    #[arg(long, value_name = "PATH")]
    policy: Option<PathBuf>,
    /// Fixity invocation counter within the run.
    #[arg(long, value_name = "N", default_value_t = 0)]
    invocation: u32,
    /// Optional config file path (defaults to preservation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for single-file digests.
#[derive(Args, Debug)]
struct DigestCommand {
    /// Algorithm identifier (`MD5`, `SHA-1`, `SHA-256`, `SHA-512`, `CRC32`).
    #[arg(long, value_name = "ALGORITHM", default_value = "SHA-256")]
    algorithm: String,
    /// Expected lower- or upper-case hex digest to check against.
    #[arg(long, value_name = "HEX")]
    expected: Option<String>,
    /// File to digest.
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    pub(crate) const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
pub(crate) type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Verify(command) => command_verify(&command),
        Commands::Digest(command) => command_digest(&command),
        Commands::Storage {
            command,
        } => command_storage(command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Digest Command
// ============================================================================

/// Executes the digest command.
fn command_digest(command: &DigestCommand) -> CliResult<ExitCode> {
    init_logging(DEFAULT_LOG_LEVEL);
    let registry = DigestRegistry::standard();
    let algorithm = registry.resolve(&command.algorithm).ok_or_else(|| {
        CliError::new(format!("unsupported algorithm: {}", command.algorithm))
    })?;
    let digest_failed = |err: DigestError| {
        CliError::new(format!("digest failed for {}: {err}", command.path.display()))
    };
    let Some(expected) = command.expected.as_deref() else {
        let bytes = match registry.digest_file(algorithm, &command.path).map_err(digest_failed)? {
            DigestOutcome::Computed(bytes) => bytes,
            DigestOutcome::Unsupported(id) => {
                return Err(CliError::new(format!("unsupported algorithm: {id}")));
            }
        };
        write_stdout_line(&format!("{}  {}", hex::encode(bytes), command.path.display()))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    };
    let verdict =
        registry.verify_file(algorithm, &command.path, expected).map_err(digest_failed)?;
    let (line, code) = match verdict {
        DigestVerdict::Matches => (format!("{}: OK", command.path.display()), ExitCode::SUCCESS),
        DigestVerdict::Mismatch {
            actual,
        } => (format!("{}: MISMATCH (computed {actual})", command.path.display()), ExitCode::FAILURE),
        DigestVerdict::Unsupported => {
            return Err(CliError::new(format!("unsupported algorithm: {}", command.algorithm)));
        }
    };
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(code)
}

// ============================================================================
// SECTION: Verify Command
// ============================================================================

/// Outcome of a fixity verification run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum VerifyStatus {
    /// Every bucket was empty or resolved to continue.
    Passed,
    /// A bucket needs human resolution.
    Escalated,
    /// Policy stopped the run.
    Aborted,
}

/// JSON report written by the verify command.
#[derive(Debug, Serialize)]
struct VerifyReport {
    /// Workflow run identifier.
    workflow: String,
    /// Run outcome.
    status: VerifyStatus,
    /// Invocation counter for the next fixity check.
    #[serde(skip_serializing_if = "Option::is_none")]
    next_invocation: Option<u32>,
    /// Abort message.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    /// Issues recorded for the workflow.
    issues: Vec<Issue>,
}

/// Executes the verify command.
fn command_verify(command: &VerifyCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let policy = match &command.policy {
        Some(path) => read_policy_json(path)?,
        None => Value::Object(serde_json::Map::new()),
    };
    let store = open_issue_store(&config.store)?;
    let checker = FixityChecker::new(
        FixityVerifier::new(Arc::new(DigestRegistry::standard())),
        IssuePolicyEngine::new(Arc::clone(&store)),
    );
    let run = FixityCheckRun::new(checker, MetsParser::new(config.fixity.mets_namespace.clone()));

    let workflow = WorkflowId::new(command.workflow.clone());
    let tool = ToolRef::new(TOOL_NAME, env!("CARGO_PKG_VERSION"));
    let request = RunRequest {
        root: &command.root,
        convention: command.convention.map(PackageConvention::from),
        metadata_pattern: command.metadata_pattern.as_deref(),
        context: FixityContext {
            workflow: &workflow,
            tool: &tool,
            invocation: command.invocation,
            config: &policy,
            formats: &NoFormats,
        },
    };

    let (status, next_invocation, message, code) = match run.execute(&request) {
        Ok(next) => (VerifyStatus::Passed, Some(next), None, ExitCode::SUCCESS),
        Err(FixityFault::Escalation {
            ..
        }) => (VerifyStatus::Escalated, None, None, ExitCode::from(ESCALATION_EXIT)),
        Err(FixityFault::Abort {
            message,
        }) => (VerifyStatus::Aborted, None, Some(message), ExitCode::FAILURE),
        Err(err) => return Err(CliError::new(format!("fixity check failed: {err}"))),
    };
    let issues = store
        .find_by_workflow(&workflow)
        .map_err(|err| CliError::new(format!("failed to read issues: {err}")))?;
    info!(workflow = %workflow, issues = issues.len(), "verify command finished");

    let report = VerifyReport {
        workflow: workflow.to_string(),
        status,
        next_invocation,
        message,
        issues,
    };
    write_json(&report)?;
    Ok(code)
}

/// Opens the issue store selected by configuration.
fn open_issue_store(config: &StoreConfig) -> CliResult<Arc<dyn IssueStore>> {
    match config.sqlite() {
        Some(sqlite) => {
            let store = SqlitePreservationStore::open(&sqlite)
                .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryIssueStore::new())),
    }
}

/// Reads the run policy JSON under a size limit.
fn read_policy_json(path: &Path) -> CliResult<Value> {
    let bytes = read_bytes_with_limit(path, MAX_POLICY_BYTES)?;
    serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(format!("invalid policy json at {}: {err}", path.display()))
    })
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Loads configuration and installs logging at the configured level.
pub(crate) fn load_config(path: Option<&Path>) -> CliResult<PreservationConfig> {
    let config = PreservationConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    init_logging(&config.logging.level);
    Ok(config)
}

/// Installs the stderr log subscriber; `PRESERVATION_LOG` overrides `level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Reads a file from disk while enforcing a hard size limit.
pub(crate) fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> CliResult<Vec<u8>> {
    let read_failed =
        |err: std::io::Error| CliError::new(format!("failed to read {}: {err}", path.display()));
    let too_large = || {
        CliError::new(format!("{} exceeds size limit of {max_bytes} bytes", path.display()))
    };
    let file = File::open(path).map_err(read_failed)?;
    let size = file.metadata().map_err(read_failed)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| too_large())?;
    if size > limit {
        return Err(too_large());
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(read_failed)?;
    if bytes.len() > max_bytes {
        return Err(too_large());
    }
    Ok(bytes)
}

/// Writes a value as pretty JSON to stdout.
pub(crate) fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render json: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
pub(crate) fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
pub(crate) fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

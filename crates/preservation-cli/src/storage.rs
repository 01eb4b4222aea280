// crates/preservation-cli/src/storage.rs
// ============================================================================
// Module: Storage Commands
// Description: Archival storage subcommands of the preservation CLI.
// Purpose: Drive the archival storage client and record object states.
// Dependencies: clap, preservation-config, preservation-storage, preservation-store-sqlite
// ============================================================================

//! ## Overview
//! Each subcommand loads configuration, builds an [`ArchivalStorageClient`]
//! from the `[storage]` section, and runs one operation. Every operation that
//! changes a remote object updates its local record through the object state
//! machine; `await` polls until the object is archived or the state-check
//! budget runs out, and `fail-run` cleans up after a failed ingest run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use clap::Subcommand;
use preservation_config::PreservationConfig;
use preservation_config::StorageConfig;
use preservation_core::Checksum;
use preservation_core::DigestOutcome;
use preservation_core::DigestRegistry;
use preservation_core::HashAlgorithm;
use preservation_core::InMemoryIndex;
use preservation_core::InMemoryObjectStateStore;
use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::ObjectStateStore;
use preservation_core::PackageId;
use preservation_core::StoredObject;
use preservation_core::WorkflowId;
use preservation_core::WorkspaceLayout;
use preservation_storage::ArchivalStorageClient;
use preservation_storage::ArchivalStorageError;
use preservation_storage::FailureHandler;
use preservation_storage::ObjectRecords;
use preservation_storage::RetryBudget;
use preservation_storage::StepOutcome;
use preservation_storage::StorageBody;
use preservation_storage::StorageCheck;
use preservation_storage::StorageSuccessVerifier;
use preservation_store_sqlite::SqlitePreservationStore;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::CliError;
use crate::CliResult;
use crate::load_config;
use crate::output_error;
use crate::write_json;
use crate::write_stdout_line;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Archival storage subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum StorageCommand {
    /// Print the remote state of a package or metadata version.
    State(ObjectArgs),
    /// Export a package with its latest or every metadata version.
    Export(ExportCommand),
    /// Export one metadata version.
    ExportXml(ExportXmlCommand),
    /// Store a new package with its first metadata version.
    Store(StoreCommand),
    /// Store a new metadata version of an archived package.
    UpdateMetadata(UpdateMetadataCommand),
    /// Delete a package.
    Delete(PackageArgs),
    /// Mark a package removed.
    Remove(PackageArgs),
    /// Roll back a package stored by a failed run.
    Rollback(PackageArgs),
    /// Roll back one metadata version stored by a failed run.
    RollbackXml(VersionArgs),
    /// Renew a removed package.
    Renew(PackageArgs),
    /// Poll until a stored object is archived.
    Await(AwaitCommand),
    /// Roll back and clean up after a failed ingest run.
    FailRun(FailRunCommand),
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
pub(crate) struct ConfigArg {
    /// Optional config file path (defaults to preservation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments addressing a package.
#[derive(Args, Debug)]
pub(crate) struct PackageArgs {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments addressing a metadata version.
#[derive(Args, Debug)]
pub(crate) struct VersionArgs {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Metadata version.
    #[arg(long, value_name = "N")]
    version: u32,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments addressing a package or one of its metadata versions.
#[derive(Args, Debug)]
pub(crate) struct ObjectArgs {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Metadata version; the package itself is addressed when omitted.
    #[arg(long, value_name = "N")]
    xml_version: Option<u32>,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

impl ObjectArgs {
    /// Returns the addressed object kind.
    fn kind(&self) -> ObjectKind {
        self.xml_version.map_or(ObjectKind::Sip, |version| ObjectKind::Xml {
            version,
        })
    }
}

/// Arguments for package export.
#[derive(Args, Debug)]
pub(crate) struct ExportCommand {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Include every metadata version.
    #[arg(long)]
    all: bool,
    /// Output file (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments for metadata export.
#[derive(Args, Debug)]
pub(crate) struct ExportXmlCommand {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Metadata version (defaults to the latest).
    #[arg(long, value_name = "N")]
    version: Option<u32>,
    /// Output file (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments for storing a package.
#[derive(Args, Debug)]
pub(crate) struct StoreCommand {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Package content archive.
    #[arg(long, value_name = "PATH")]
    content: PathBuf,
    /// First metadata version.
    #[arg(long, value_name = "PATH")]
    metadata: PathBuf,
    /// Digest algorithm sent with both parts.
    #[arg(long, value_name = "ALGORITHM", default_value = "SHA-256")]
    algorithm: String,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments for storing a metadata version.
#[derive(Args, Debug)]
pub(crate) struct UpdateMetadataCommand {
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Metadata document.
    #[arg(long, value_name = "PATH")]
    metadata: PathBuf,
    /// Version assigned to the document.
    #[arg(long, value_name = "N")]
    version: u32,
    /// Wait for the service to finish storing before it answers.
    #[arg(long)]
    sync: bool,
    /// Digest algorithm sent with the document.
    #[arg(long, value_name = "ALGORITHM", default_value = "SHA-256")]
    algorithm: String,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Arguments for polling a stored object.
#[derive(Args, Debug)]
pub(crate) struct AwaitCommand {
    /// Addressed object.
    #[command(flatten)]
    object: ObjectArgs,
    /// Maximum state checks while the object is processing.
    #[arg(long, value_name = "N", default_value_t = 10)]
    state_checks: u32,
    /// Delay between state checks in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 1_000)]
    interval_ms: u64,
}

/// Arguments for cleaning up a failed run.
#[derive(Args, Debug)]
pub(crate) struct FailRunCommand {
    /// Workflow run identifier.
    #[arg(long, value_name = "ID")]
    workflow: String,
    /// Package identifier.
    #[arg(long, value_name = "ID")]
    package: String,
    /// Metadata version assigned during the run; omit when nothing was stored.
    #[arg(long, value_name = "N")]
    xml_version: Option<u32>,
    /// Configuration.
    #[command(flatten)]
    config: ConfigArg,
}

/// Local record change applied after a remote operation.
#[derive(Debug, Clone, Copy)]
struct RecordUpdate {
    /// Addressed object kind.
    kind: ObjectKind,
    /// State reached when the operation succeeds.
    reached: ObjectState,
    /// Failure marker recorded when the operation fails.
    failure: Option<ObjectState>,
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Dispatches storage subcommands.
pub(crate) fn command_storage(command: StorageCommand) -> CliResult<ExitCode> {
    match command {
        StorageCommand::State(args) => command_state(&args),
        StorageCommand::Export(command) => command_export(&command),
        StorageCommand::ExportXml(command) => command_export_xml(&command),
        StorageCommand::Store(command) => command_store(&command),
        StorageCommand::UpdateMetadata(command) => command_update_metadata(&command),
        StorageCommand::Delete(args) => recorded_operation(
            &args.config,
            "delete",
            &args.package,
            RecordUpdate {
                kind: ObjectKind::Sip,
                reached: ObjectState::Deleted,
                failure: Some(ObjectState::DeletionFailure),
            },
            ArchivalStorageClient::delete,
        ),
        StorageCommand::Remove(args) => recorded_operation(
            &args.config,
            "remove",
            &args.package,
            RecordUpdate {
                kind: ObjectKind::Sip,
                reached: ObjectState::Removed,
                failure: None,
            },
            ArchivalStorageClient::remove,
        ),
        StorageCommand::Rollback(args) => recorded_operation(
            &args.config,
            "rollback",
            &args.package,
            RecordUpdate {
                kind: ObjectKind::Sip,
                reached: ObjectState::RolledBack,
                failure: Some(ObjectState::RollbackFailure),
            },
            ArchivalStorageClient::rollback,
        ),
        StorageCommand::RollbackXml(args) => recorded_operation(
            &args.config,
            "rollback-xml",
            &args.package,
            RecordUpdate {
                kind: ObjectKind::Xml {
                    version: args.version,
                },
                reached: ObjectState::RolledBack,
                failure: Some(ObjectState::RollbackFailure),
            },
            |client, package| client.rollback_xml(package, args.version),
        ),
        StorageCommand::Renew(args) => recorded_operation(
            &args.config,
            "renew",
            &args.package,
            RecordUpdate {
                kind: ObjectKind::Sip,
                reached: ObjectState::Archived,
                failure: None,
            },
            ArchivalStorageClient::renew,
        ),
        StorageCommand::Await(command) => command_await(&command),
        StorageCommand::FailRun(command) => command_fail_run(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Prints the remote state of an object.
fn command_state(args: &ObjectArgs) -> CliResult<ExitCode> {
    let (_, client) = connect(&args.config)?;
    let package = PackageId::new(&args.package);
    let state = match args.kind() {
        ObjectKind::Sip => client.get_state(&package),
        ObjectKind::Xml {
            version,
        } => client.get_xml_state(&package, version),
    }
    .map_err(storage_failed)?;
    write_stdout_line(state.as_str()).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Exports a package.
fn command_export(command: &ExportCommand) -> CliResult<ExitCode> {
    let (_, client) = connect(&command.config)?;
    let body =
        client.export(&PackageId::new(&command.package), command.all).map_err(storage_failed)?;
    copy_body(body, command.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

/// Exports a metadata version.
fn command_export_xml(command: &ExportXmlCommand) -> CliResult<ExitCode> {
    let (_, client) = connect(&command.config)?;
    let body = client
        .export_xml(&PackageId::new(&command.package), command.version)
        .map_err(storage_failed)?;
    copy_body(body, command.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

/// Stores a package and records it as processing.
fn command_store(command: &StoreCommand) -> CliResult<ExitCode> {
    let (config, client) = connect(&command.config)?;
    let registry = DigestRegistry::standard();
    let algorithm = resolve_algorithm(&registry, &command.algorithm)?;
    let content_digest = file_checksum(&registry, algorithm, &command.content)?;
    let metadata_digest = file_checksum(&registry, algorithm, &command.metadata)?;
    let package = PackageId::new(&command.package);
    let body = client
        .store(
            &package,
            open_file(&command.content)?,
            open_file(&command.metadata)?,
            &content_digest,
            &metadata_digest,
        )
        .map_err(storage_failed)?;
    let object = StoredObject::submit(package, ObjectKind::Sip);
    record_object(&config, &object)?;
    report_accepted("store", &body)?;
    Ok(ExitCode::SUCCESS)
}

/// Stores a metadata version and records it as processing.
fn command_update_metadata(command: &UpdateMetadataCommand) -> CliResult<ExitCode> {
    let (config, client) = connect(&command.config)?;
    let registry = DigestRegistry::standard();
    let algorithm = resolve_algorithm(&registry, &command.algorithm)?;
    let digest = file_checksum(&registry, algorithm, &command.metadata)?;
    let package = PackageId::new(&command.package);
    let body = client
        .update_metadata(
            &package,
            open_file(&command.metadata)?,
            &digest,
            command.version,
            command.sync,
        )
        .map_err(storage_failed)?;
    let object = StoredObject::submit(
        package,
        ObjectKind::Xml {
            version: command.version,
        },
    );
    record_object(&config, &object)?;
    report_accepted("update-metadata", &body)?;
    Ok(ExitCode::SUCCESS)
}

/// Result of an await run.
#[derive(Debug, Serialize)]
struct AwaitReport {
    /// Final object record.
    object: StoredObject,
    /// Whether the object reached `ARCHIVED`.
    stored: bool,
    /// Failure description when the object did not reach `ARCHIVED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Polls a stored object until it is archived or the budget runs out.
fn command_await(command: &AwaitCommand) -> CliResult<ExitCode> {
    let (config, client) = connect(&command.object.config)?;
    let objects = open_object_store(&config)?;
    let package = PackageId::new(&command.object.package);
    let kind = command.object.kind();
    let mut object = objects
        .find_object(&package, kind)
        .map_err(|err| CliError::new(format!("failed to read object record: {err}")))?
        .unwrap_or_else(|| StoredObject::submit(package.clone(), kind));
    let verifier = StorageSuccessVerifier::with_records(&client, ObjectRecords::new(Arc::clone(&objects)));
    let mut budget = RetryBudget::new(command.state_checks, 1);

    let reason = loop {
        match verifier.check(&mut object, &mut budget) {
            StorageCheck::Stored => break None,
            StorageCheck::Processing {
                remaining_checks: 0,
            } => break Some("state checks exhausted while processing".to_string()),
            StorageCheck::Processing {
                ..
            } => thread::sleep(Duration::from_millis(command.interval_ms)),
            StorageCheck::Failed {
                state,
                ..
            } => break Some(format!("store failed with state {state}")),
            StorageCheck::Unexpected(state) => break Some(format!("unexpected state {state}")),
        }
    };
    objects
        .save_object(&object)
        .map_err(|err| CliError::new(format!("failed to record object: {err}")))?;
    info!(package = %object.id, kind = %object.kind, state = %object.state, "await finished");

    let code = if reason.is_none() { ExitCode::SUCCESS } else { ExitCode::FAILURE };
    write_json(&AwaitReport {
        stored: reason.is_none(),
        object,
        reason,
    })?;
    Ok(code)
}

/// Runs a package operation and applies its result to the local record.
fn recorded_operation<F>(
    config: &ConfigArg,
    label: &str,
    package: &str,
    update: RecordUpdate,
    operation: F,
) -> CliResult<ExitCode>
where
    F: FnOnce(&ArchivalStorageClient, &PackageId) -> Result<StorageBody, ArchivalStorageError>,
{
    let (config, client) = connect(config)?;
    let records = ObjectRecords::new(open_object_store(&config)?);
    let package = PackageId::new(package);
    match operation(&client, &package) {
        Ok(body) => {
            let outcome = records.record_remote(&package, update.kind, update.reached);
            report_accepted(label, &body)?;
            report_record(&outcome)
        }
        Err(err) => {
            if let Some(marker) = update.failure
                && let StepOutcome::Failed(detail) = records.record_failure(&package, update.kind, marker)
            {
                warn!(package = %package, marker = %marker, error = %detail, "failure marker not recorded");
            }
            Err(storage_failed(err))
        }
    }
}

/// One cleanup step in a fail-run report.
#[derive(Debug, Serialize)]
struct StepReport {
    /// `completed`, `skipped`, or `failed`.
    status: &'static str,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl From<StepOutcome> for StepReport {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Skipped => Self {
                status: "skipped",
                detail: None,
            },
            StepOutcome::Completed => Self {
                status: "completed",
                detail: None,
            },
            StepOutcome::Failed(detail) => Self {
                status: "failed",
                detail: Some(detail),
            },
        }
    }
}

/// Result of a fail-run cleanup.
#[derive(Debug, Serialize)]
struct FailRunReport {
    /// Workflow run identifier.
    workflow: WorkflowId,
    /// Remote rollback.
    rollback: StepReport,
    /// Local object record update.
    local_record: StepReport,
    /// Workspace directory removal.
    workspace: StepReport,
    /// Search index entry removal.
    index: StepReport,
    /// Whether every step succeeded or had nothing to do.
    clean: bool,
}

/// Rolls back remote objects and removes local traces of a failed run.
fn command_fail_run(command: &FailRunCommand) -> CliResult<ExitCode> {
    let (config, client) = connect(&command.config)?;
    let handler = FailureHandler::new(
        Arc::new(client),
        open_object_store(&config)?,
        WorkspaceLayout::new(&config.workspace.root),
        Arc::new(InMemoryIndex::new()),
    );
    let workflow = WorkflowId::new(&command.workflow);
    let report =
        handler.handle_failure(&workflow, &PackageId::new(&command.package), command.xml_version);
    let clean = report.is_clean();
    write_json(&FailRunReport {
        workflow,
        rollback: report.rollback.into(),
        local_record: report.local_record.into(),
        workspace: report.workspace.into(),
        index: report.index.into(),
        clean,
    })?;
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration and builds the storage client.
fn connect(config: &ConfigArg) -> CliResult<(PreservationConfig, ArchivalStorageClient)> {
    let config = load_config(config.config.as_deref())?;
    let client_config = config
        .require_storage()
        .and_then(StorageConfig::client_config)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let client = ArchivalStorageClient::new(client_config).map_err(storage_failed)?;
    Ok((config, client))
}

/// Opens the object record store selected by configuration.
fn open_object_store(config: &PreservationConfig) -> CliResult<Arc<dyn ObjectStateStore>> {
    match config.store.sqlite() {
        Some(sqlite) => {
            let store = SqlitePreservationStore::open(&sqlite)
                .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryObjectStateStore::new())),
    }
}

/// Saves an object record in the configured store.
fn record_object(config: &PreservationConfig, object: &StoredObject) -> CliResult<()> {
    open_object_store(config)?
        .save_object(object)
        .map_err(|err| CliError::new(format!("failed to record object: {err}")))
}

/// Resolves an algorithm identifier against the registry.
fn resolve_algorithm(registry: &DigestRegistry, id: &str) -> CliResult<HashAlgorithm> {
    registry.resolve(id).ok_or_else(|| CliError::new(format!("unsupported algorithm: {id}")))
}

/// Computes the checksum sent alongside an uploaded file.
fn file_checksum(
    registry: &DigestRegistry,
    algorithm: HashAlgorithm,
    path: &Path,
) -> CliResult<Checksum> {
    match registry.digest_file(algorithm, path) {
        Ok(DigestOutcome::Computed(bytes)) => Ok(Checksum::from_bytes(algorithm, &bytes)),
        Ok(DigestOutcome::Unsupported(id)) => {
            Err(CliError::new(format!("unsupported algorithm: {id}")))
        }
        Err(err) => Err(CliError::new(format!("digest failed for {}: {err}", path.display()))),
    }
}

/// Opens an upload part.
fn open_file(path: &Path) -> CliResult<File> {
    File::open(path)
        .map_err(|err| CliError::new(format!("failed to open {}: {err}", path.display())))
}

/// Streams a response body to a file or stdout.
fn copy_body(mut body: StorageBody, output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => {
            let mut file = File::create(path).map_err(|err| {
                CliError::new(format!("failed to create {}: {err}", path.display()))
            })?;
            io::copy(&mut body, &mut file).map_err(|err| {
                CliError::new(format!("failed to write {}: {err}", path.display()))
            })?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            io::copy(&mut body, &mut stdout)
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(())
}

/// Prints the accepted status of an operation.
fn report_accepted(label: &str, body: &StorageBody) -> CliResult<()> {
    write_stdout_line(&format!("{label} accepted (status {})", body.status()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Prints the local record outcome of an operation.
fn report_record(outcome: &StepOutcome) -> CliResult<ExitCode> {
    let line = match outcome {
        StepOutcome::Completed => "local record updated",
        StepOutcome::Skipped => "local record unchanged",
        StepOutcome::Failed(detail) => {
            return Err(CliError::new(format!("failed to record object: {detail}")));
        }
    };
    write_stdout_line(line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Formats a storage error.
fn storage_failed(err: ArchivalStorageError) -> CliError {
    CliError::new(format!("archival storage error: {err}"))
}

// crates/preservation-storage/src/failure.rs
// ============================================================================
// Module: Failure Handler
// Description: Cleanup after an unrecoverable ingest workflow failure.
// Purpose: Roll back remote objects and remove local traces in a fixed order.
// Dependencies: preservation-core, tracing
// ============================================================================

//! ## Overview
//! When an ingest run fails after metadata was assigned a version, the remote
//! objects are rolled back first: version 1 rolls back the whole package,
//! later versions roll back only that metadata version. A failed rollback is
//! recorded locally as `ROLLBACK_FAILURE` and never blocks the local steps.
//! A successful rollback is recorded only when the object kind allows the
//! move, so a confirmed metadata version or a deleted package keeps its record.
//! The run workspace directory is removed next, and the search index entry
//! last.
//!
//! Invariants:
//! - Every step runs even when an earlier step failed.
//! - Remote rollback always precedes workspace removal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use preservation_core::IndexNotifier;
use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::ObjectStateStore;
use preservation_core::PackageId;
use preservation_core::WorkflowId;
use preservation_core::WorkspaceLayout;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::client::ArchivalStorageClient;
use crate::client::ArchivalStorageError;
use crate::records::ObjectRecords;
use crate::records::StepOutcome;

// ============================================================================
// SECTION: Remote Rollback
// ============================================================================

/// Remote rollback operations.
pub trait RemoteRollback: Send + Sync {
    /// Rolls back a package and its first metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] when the rollback fails.
    fn rollback_package(&self, package: &PackageId) -> Result<(), ArchivalStorageError>;

    /// Rolls back one metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] when the rollback fails.
    fn rollback_metadata(&self, package: &PackageId, version: u32) -> Result<(), ArchivalStorageError>;
}

impl RemoteRollback for ArchivalStorageClient {
    fn rollback_package(&self, package: &PackageId) -> Result<(), ArchivalStorageError> {
        self.rollback(package).map(drop)
    }

    fn rollback_metadata(&self, package: &PackageId, version: u32) -> Result<(), ArchivalStorageError> {
        self.rollback_xml(package, version).map(drop)
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome of every cleanup step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Remote rollback.
    pub rollback: StepOutcome,
    /// Local object record update.
    pub local_record: StepOutcome,
    /// Workspace directory removal.
    pub workspace: StepOutcome,
    /// Search index entry removal.
    pub index: StepOutcome,
}

impl FailureReport {
    /// Returns true when no step failed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        !self.rollback.is_failed()
            && !self.local_record.is_failed()
            && !self.workspace.is_failed()
            && !self.index.is_failed()
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Cleans up after a failed ingest run.
#[derive(Clone)]
pub struct FailureHandler {
    /// Remote rollback collaborator.
    remote: Arc<dyn RemoteRollback>,
    /// Local object records.
    records: ObjectRecords,
    /// Per-run workspace layout.
    workspace: WorkspaceLayout,
    /// Search index collaborator.
    index: Arc<dyn IndexNotifier>,
}

impl FailureHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteRollback>,
        objects: Arc<dyn ObjectStateStore>,
        workspace: WorkspaceLayout,
        index: Arc<dyn IndexNotifier>,
    ) -> Self {
        Self {
            remote,
            records: ObjectRecords::new(objects),
            workspace,
            index,
        }
    }

    /// Runs every cleanup step for a failed run.
    ///
    /// `xml_version` is the metadata version assigned during the run; without
    /// one nothing was sent to archival storage and the rollback is skipped.
    #[must_use]
    pub fn handle_failure(
        &self,
        workflow: &WorkflowId,
        package: &PackageId,
        xml_version: Option<u32>,
    ) -> FailureReport {
        let (rollback, local_record) = match xml_version {
            Some(version) => self.roll_back(package, version),
            None => (StepOutcome::Skipped, StepOutcome::Skipped),
        };
        let workspace = match self.workspace.remove_run_dir(workflow) {
            Ok(true) => StepOutcome::Completed,
            Ok(false) => StepOutcome::Skipped,
            Err(err) => {
                warn!(workflow = %workflow, error = %err, "workspace removal failed");
                StepOutcome::Failed(err.to_string())
            }
        };
        let index = match self.index.remove_entry(workflow) {
            Ok(()) => StepOutcome::Completed,
            Err(err) => {
                warn!(workflow = %workflow, error = %err, "index entry removal failed");
                StepOutcome::Failed(err.to_string())
            }
        };
        let report = FailureReport {
            rollback,
            local_record,
            workspace,
            index,
        };
        info!(workflow = %workflow, package = %package, clean = report.is_clean(), "failed run cleaned up");
        report
    }

    /// Rolls back the remote objects and records the result locally.
    fn roll_back(&self, package: &PackageId, version: u32) -> (StepOutcome, StepOutcome) {
        let (kind, result) = if version == 1 {
            (ObjectKind::Sip, self.remote.rollback_package(package))
        } else {
            (
                ObjectKind::Xml {
                    version,
                },
                self.remote.rollback_metadata(package, version),
            )
        };
        match result {
            Ok(()) => {
                info!(package = %package, kind = %kind, "remote rollback completed");
                (StepOutcome::Completed, self.records.record_remote(package, kind, ObjectState::RolledBack))
            }
            Err(err) => {
                error!(package = %package, kind = %kind, error = %err, "remote rollback failed");
                (
                    StepOutcome::Failed(err.to_string()),
                    self.records.record_failure(package, kind, ObjectState::RollbackFailure),
                )
            }
        }
    }
}

// crates/preservation-storage/src/success.rs
// ============================================================================
// Module: Storage Success Verification
// Description: Classification of the remote state of a freshly stored object.
// Purpose: Decide whether a store finished, is still running, or must be retried.
// Dependencies: preservation-core, tracing
// ============================================================================

//! ## Overview
//! After a package or metadata version is submitted, the workflow polls its
//! remote state. Each poll consumes from a [`RetryBudget`]:
//! - `ARCHIVED`: stored.
//! - `PROCESSING`, `PRE_PROCESSING`, or a failed query: still processing; one
//!   state check is consumed.
//! - `ARCHIVAL_FAILURE`, `ROLLED_BACK`, `ROLLBACK_FAILURE`: the store failed;
//!   one store attempt is consumed.
//! - Anything else is unexpected.
//!
//! Observed remote states are recorded on the local [`StoredObject`] when
//! its kind allows the move. Once a metadata version is archived, the
//! earlier versions of the package are confirmed and become immutable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::PackageId;
use preservation_core::StoredObject;
use preservation_core::TransitionError;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::client::ArchivalStorageClient;
use crate::client::ArchivalStorageError;
use crate::records::ObjectRecords;
use crate::records::StepOutcome;

// ============================================================================
// SECTION: Remote State
// ============================================================================

/// Remote state queries.
pub trait RemoteStateQuery {
    /// Returns the remote state of a package.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] when the query fails.
    fn package_state(&self, package: &PackageId) -> Result<ObjectState, ArchivalStorageError>;

    /// Returns the remote state of one metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] when the query fails.
    fn metadata_state(
        &self,
        package: &PackageId,
        version: u32,
    ) -> Result<ObjectState, ArchivalStorageError>;
}

impl RemoteStateQuery for ArchivalStorageClient {
    fn package_state(&self, package: &PackageId) -> Result<ObjectState, ArchivalStorageError> {
        self.get_state(package)
    }

    fn metadata_state(
        &self,
        package: &PackageId,
        version: u32,
    ) -> Result<ObjectState, ArchivalStorageError> {
        self.get_xml_state(package, version)
    }
}

// ============================================================================
// SECTION: Budget and Verdicts
// ============================================================================

/// Remaining polls and store attempts for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Remaining state checks while the object is processing.
    pub state_checks: u32,
    /// Remaining store attempts after a failed store.
    pub store_attempts: u32,
}

impl RetryBudget {
    /// Creates a budget.
    #[must_use]
    pub const fn new(state_checks: u32, store_attempts: u32) -> Self {
        Self {
            state_checks,
            store_attempts,
        }
    }
}

/// Classification of one state poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCheck {
    /// The object is archived.
    Stored,
    /// The object is still being processed.
    Processing {
        /// State checks left after this poll.
        remaining_checks: u32,
    },
    /// The store failed and may be attempted again.
    Failed {
        /// Reported state.
        state: ObjectState,
        /// Store attempts left after this poll.
        remaining_attempts: u32,
    },
    /// The object is in a state a fresh store never reaches.
    Unexpected(ObjectState),
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Polls and classifies the remote state of stored objects.
pub struct StorageSuccessVerifier<'a, R: ?Sized> {
    /// Remote state source.
    remote: &'a R,
    /// Local records confirmed when a newer metadata version is archived.
    records: Option<ObjectRecords>,
}

impl<'a, R: RemoteStateQuery + ?Sized> StorageSuccessVerifier<'a, R> {
    /// Creates a verifier over a remote state source.
    #[must_use]
    pub const fn new(remote: &'a R) -> Self {
        Self {
            remote,
            records: None,
        }
    }

    /// Creates a verifier that confirms earlier metadata versions in
    /// `records` once a newer version is archived.
    #[must_use]
    pub fn with_records(remote: &'a R, records: ObjectRecords) -> Self {
        Self {
            remote,
            records: Some(records),
        }
    }

    /// Polls the remote state of `object` once and consumes from `budget`.
    ///
    /// Metadata objects query their version; packages query the package.
    pub fn check(&self, object: &mut StoredObject, budget: &mut RetryBudget) -> StorageCheck {
        let queried = match object.kind {
            ObjectKind::Sip => self.remote.package_state(&object.id),
            ObjectKind::Xml {
                version,
            } => self.remote.metadata_state(&object.id, version),
        };
        let state = match queried {
            Ok(state) => state,
            Err(err) => {
                warn!(package = %object.id, error = %err, "state query failed, treating as processing");
                budget.state_checks = budget.state_checks.saturating_sub(1);
                return StorageCheck::Processing {
                    remaining_checks: budget.state_checks,
                };
            }
        };
        debug!(package = %object.id, kind = %object.kind, state = %state, "remote state retrieved");
        match object.observe(state) {
            Ok(_) => {}
            Err(err @ TransitionError::LocalOnly(_)) => {
                warn!(package = %object.id, error = %err, "archival storage reported a local-only state");
            }
            Err(err) => {
                debug!(package = %object.id, error = %err, "local object record kept");
            }
        }
        match state {
            ObjectState::Archived => {
                self.confirm_prior_versions(object);
                StorageCheck::Stored
            }
            ObjectState::Processing | ObjectState::PreProcessing => {
                budget.state_checks = budget.state_checks.saturating_sub(1);
                StorageCheck::Processing {
                    remaining_checks: budget.state_checks,
                }
            }
            ObjectState::ArchivalFailure | ObjectState::RolledBack | ObjectState::RollbackFailure => {
                budget.store_attempts = budget.store_attempts.saturating_sub(1);
                StorageCheck::Failed {
                    state,
                    remaining_attempts: budget.store_attempts,
                }
            }
            other => {
                error!(package = %object.id, state = %other, "stored object is in an unexpected state");
                StorageCheck::Unexpected(other)
            }
        }
    }

    /// Confirms the metadata versions preceding an archived version.
    fn confirm_prior_versions(&self, object: &StoredObject) {
        let Some(records) = &self.records else {
            return;
        };
        let ObjectKind::Xml {
            version,
        } = object.kind
        else {
            return;
        };
        if let StepOutcome::Failed(detail) = records.confirm_prior_versions(&object.id, version) {
            warn!(package = %object.id, version, error = %detail, "earlier metadata versions not confirmed");
        }
    }
}

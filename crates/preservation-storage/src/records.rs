// crates/preservation-storage/src/records.rs
// ============================================================================
// Module: Local Object Records
// Description: Applies remote operation results to local stored object records.
// Purpose: Keep local records on the legal state machine of their object kind.
// Dependencies: preservation-core, tracing
// ============================================================================

//! ## Overview
//! Every remote operation that changes an object ends with a local record
//! update. Remote states go through [`StoredObject::observe`], so a move the
//! object kind does not allow leaves the prior record in place and is
//! reported as [`StepOutcome::Skipped`]. Failure markers go through
//! [`StoredObject::mark_failure`]; an object that already holds a marker keeps
//! it.
//!
//! Invariants:
//! - A confirmed XML version is never rewritten to `ROLLED_BACK`.
//! - A `DELETED` package never leaves `DELETED` through a remote observation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::ObjectStateStore;
use preservation_core::PackageId;
use preservation_core::StoredObject;
use preservation_core::TransitionError;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Step Outcome
// ============================================================================

/// Outcome of one record update or cleanup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do.
    Skipped,
    /// The step succeeded.
    Completed,
    /// The step failed with the given detail.
    Failed(String),
}

impl StepOutcome {
    /// Returns true when the step failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Local stored object records updated after remote operations.
#[derive(Clone)]
pub struct ObjectRecords {
    /// Backing record store.
    objects: Arc<dyn ObjectStateStore>,
}

impl ObjectRecords {
    /// Creates a record updater over `objects`.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStateStore>) -> Self {
        Self {
            objects,
        }
    }

    /// Records a remote state reached by a completed operation.
    ///
    /// An object without a local record starts from a fresh submission.
    #[must_use]
    pub fn record_remote(&self, package: &PackageId, kind: ObjectKind, state: ObjectState) -> StepOutcome {
        let mut object = match self.load(package, kind) {
            Ok(object) => object,
            Err(outcome) => return outcome,
        };
        match object.observe(state) {
            Ok(true) => self.save(&object),
            Ok(false) => StepOutcome::Skipped,
            Err(err @ TransitionError::Illegal {
                ..
            }) => {
                warn!(package = %package, kind = %kind, error = %err, "local object record kept");
                StepOutcome::Skipped
            }
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }

    /// Records a local failure marker after a remote operation failed.
    #[must_use]
    pub fn record_failure(&self, package: &PackageId, kind: ObjectKind, marker: ObjectState) -> StepOutcome {
        let mut object = match self.load(package, kind) {
            Ok(object) => object,
            Err(outcome) => return outcome,
        };
        match object.mark_failure(marker) {
            Ok(()) => self.save(&object),
            Err(TransitionError::AlreadyFailed(existing)) => {
                debug!(package = %package, kind = %kind, marker = %existing, "failure marker kept");
                StepOutcome::Skipped
            }
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }

    /// Confirms every earlier metadata version once `version` is archived.
    #[must_use]
    pub fn confirm_prior_versions(&self, package: &PackageId, version: u32) -> StepOutcome {
        let mut outcome = StepOutcome::Skipped;
        for prior in 1 .. version {
            let kind = ObjectKind::Xml {
                version: prior,
            };
            let mut object = match self.objects.find_object(package, kind) {
                Ok(Some(object)) if !object.confirmed => object,
                Ok(_) => continue,
                Err(err) => return StepOutcome::Failed(err.to_string()),
            };
            object.confirm();
            outcome = self.save(&object);
            if outcome.is_failed() {
                return outcome;
            }
        }
        outcome
    }

    /// Loads a record or starts a fresh one.
    fn load(&self, package: &PackageId, kind: ObjectKind) -> Result<StoredObject, StepOutcome> {
        match self.objects.find_object(package, kind) {
            Ok(existing) => Ok(existing.unwrap_or_else(|| StoredObject::submit(package.clone(), kind))),
            Err(err) => Err(StepOutcome::Failed(err.to_string())),
        }
    }

    /// Saves a record.
    fn save(&self, object: &StoredObject) -> StepOutcome {
        match self.objects.save_object(object) {
            Ok(()) => StepOutcome::Completed,
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }
}

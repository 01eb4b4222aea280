// crates/preservation-core/src/core/state.rs
// ============================================================================
// Module: Stored Object State
// Description: Lifecycle states of archived packages and XML metadata versions.
// Purpose: Encode the legal transitions shared by the storage client and failure handling.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`StoredObject`] tracks the remote lifecycle of a SIP or one XML metadata
//! version. The remote archival storage reports the non-failure states; the
//! three `*_FAILURE` states are local-only markers recorded when a remote
//! operation itself failed and must be reconciled by an operator.
//!
//! Invariants:
//! - Newly submitted objects start in [`ObjectState::Processing`].
//! - XML objects are never removed or deleted.
//! - Only the latest unconfirmed XML version may be rolled back once archived.
//! - Local-only markers are terminal and are never accepted from the remote side.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::PackageId;

// ============================================================================
// SECTION: Object State
// ============================================================================

/// Lifecycle state of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectState {
    /// Transfer and checksum verification in progress.
    PreProcessing,
    /// Submitted and being committed.
    Processing,
    /// Committed.
    Archived,
    /// Commit failed and was rolled back.
    RolledBack,
    /// Physically deleted.
    Deleted,
    /// Logically removed; can be renewed.
    Removed,
    /// Local marker: archival failed.
    ArchivalFailure,
    /// Local marker: deletion failed.
    DeletionFailure,
    /// Local marker: rollback failed.
    RollbackFailure,
}

impl ObjectState {
    /// All states in declaration order.
    pub const ALL: [Self; 9] = [
        Self::PreProcessing,
        Self::Processing,
        Self::Archived,
        Self::RolledBack,
        Self::Deleted,
        Self::Removed,
        Self::ArchivalFailure,
        Self::DeletionFailure,
        Self::RollbackFailure,
    ];

    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreProcessing => "PRE_PROCESSING",
            Self::Processing => "PROCESSING",
            Self::Archived => "ARCHIVED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Deleted => "DELETED",
            Self::Removed => "REMOVED",
            Self::ArchivalFailure => "ARCHIVAL_FAILURE",
            Self::DeletionFailure => "DELETION_FAILURE",
            Self::RollbackFailure => "ROLLBACK_FAILURE",
        }
    }

    /// Returns true for the locally recorded failure markers.
    #[must_use]
    pub const fn is_local_only(self) -> bool {
        matches!(self, Self::ArchivalFailure | Self::DeletionFailure | Self::RollbackFailure)
    }

    /// Returns true when no further transition is legal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RolledBack | Self::Deleted) || self.is_local_only()
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a state name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object state: {0}")]
pub struct UnknownObjectState(pub String);

impl FromStr for ObjectState {
    type Err = UnknownObjectState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| UnknownObjectState(value.to_string()))
    }
}

// ============================================================================
// SECTION: Object Kind
// ============================================================================

/// Kind of stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectKind {
    /// The submitted package content.
    Sip,
    /// One version of the package's XML metadata.
    Xml {
        /// Metadata version, starting at 1.
        version: u32,
    },
}

impl ObjectKind {
    /// Returns true when `from -> to` is a legal remote transition.
    ///
    /// `latest_unconfirmed` applies to XML rollback of an archived version.
    #[must_use]
    pub const fn allows(self, from: ObjectState, to: ObjectState, latest_unconfirmed: bool) -> bool {
        use ObjectState::Archived;
        use ObjectState::Deleted;
        use ObjectState::PreProcessing;
        use ObjectState::Processing;
        use ObjectState::Removed;
        use ObjectState::RolledBack;

        match self {
            Self::Sip => matches!(
                (from, to),
                (PreProcessing, Processing)
                    | (Processing, Archived | RolledBack)
                    | (Archived, Removed | Deleted)
                    | (Removed, Archived | Deleted)
            ),
            Self::Xml {
                ..
            } => match (from, to) {
                (Processing, Archived | RolledBack) => true,
                (Archived, RolledBack) => latest_unconfirmed,
                _ => false,
            },
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sip => f.write_str("sip"),
            Self::Xml {
                version,
            } => write!(f, "xml v{version}"),
        }
    }
}

// ============================================================================
// SECTION: Stored Object
// ============================================================================

/// Errors raised by illegal state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The transition is not legal for the object kind.
    #[error("illegal {kind} transition {from} -> {to}")]
    Illegal {
        /// Object kind.
        kind: ObjectKind,
        /// Current state.
        from: ObjectState,
        /// Requested state.
        to: ObjectState,
    },
    /// A local-only marker was reported as a remote state.
    #[error("state {0} is local-only and cannot be observed remotely")]
    LocalOnly(ObjectState),
    /// A failure marker was requested with a non-failure state.
    #[error("state {0} is not a local failure marker")]
    NotFailureMarker(ObjectState),
    /// The object already holds a local failure marker.
    #[error("object already marked {0}")]
    AlreadyFailed(ObjectState),
}

/// Local record of a remote stored object.
///
/// # Invariants
/// - Records are never deleted locally, even after remote deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Package identifier.
    pub id: PackageId,
    /// Object kind.
    pub kind: ObjectKind,
    /// Current state.
    pub state: ObjectState,
    /// Whether a later step confirmed this object (XML versions only).
    pub confirmed: bool,
}

impl StoredObject {
    /// Creates a record for a newly submitted object in `PROCESSING`.
    #[must_use]
    pub const fn submit(id: PackageId, kind: ObjectKind) -> Self {
        Self {
            id,
            kind,
            state: ObjectState::Processing,
            confirmed: false,
        }
    }

    /// Applies a legal transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] when the kind does not allow it.
    pub fn transition(&mut self, to: ObjectState) -> Result<(), TransitionError> {
        if !self.kind.allows(self.state, to, !self.confirmed) {
            return Err(TransitionError::Illegal {
                kind: self.kind,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Records a state reported by the remote side.
    ///
    /// Returns `false` when the record already holds `remote`. Any other
    /// change goes through [`StoredObject::transition`], so the record is left
    /// untouched when the kind does not allow the move.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::LocalOnly`] for local failure markers and
    /// [`TransitionError::Illegal`] for a move the kind does not allow.
    pub fn observe(&mut self, remote: ObjectState) -> Result<bool, TransitionError> {
        if remote.is_local_only() {
            return Err(TransitionError::LocalOnly(remote));
        }
        if remote == self.state {
            return Ok(false);
        }
        self.transition(remote)?;
        Ok(true)
    }

    /// Records a local failure marker.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotFailureMarker`] for non-marker states and
    /// [`TransitionError::AlreadyFailed`] when a marker is already recorded.
    pub fn mark_failure(&mut self, marker: ObjectState) -> Result<(), TransitionError> {
        if !marker.is_local_only() {
            return Err(TransitionError::NotFailureMarker(marker));
        }
        if self.state.is_local_only() {
            return Err(TransitionError::AlreadyFailed(self.state));
        }
        self.state = marker;
        Ok(())
    }

    /// Marks the object as confirmed by a later workflow step.
    ///
    /// A confirmed XML version is immutable once archived.
    pub const fn confirm(&mut self) {
        self.confirmed = true;
    }
}

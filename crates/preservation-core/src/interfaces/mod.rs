// crates/preservation-core/src/interfaces/mod.rs
// ============================================================================
// Module: Preservation Interfaces
// Description: Collaborator contracts for issue persistence, format lookup,
//              index notification, and stored object records.
// Purpose: Define the seams between the preservation core and external systems.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The preservation core never talks to the relational database, the format
//! identification step, or the search index directly. It consumes them
//! through the traits defined here. Implementations must fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::identifiers::FormatRef;
use crate::core::identifiers::PackageId;
use crate::core::identifiers::WorkflowId;
use crate::core::issue::Issue;
use crate::core::state::ObjectKind;
use crate::core::state::StoredObject;

// ============================================================================
// SECTION: Issue Store
// ============================================================================

/// Issue store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueStoreError {
    /// Store I/O error.
    #[error("issue store io error: {0}")]
    Io(String),
    /// Stored data is invalid.
    #[error("issue store invalid data: {0}")]
    Invalid(String),
}

/// Persistence for fixity issues.
pub trait IssueStore: Send + Sync {
    /// Saves a batch of issues atomically.
    ///
    /// # Errors
    ///
    /// Returns [`IssueStoreError`] when saving fails.
    fn save(&self, issues: &[Issue]) -> Result<(), IssueStoreError>;

    /// Returns every issue recorded for a workflow run, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`IssueStoreError`] when loading fails.
    fn find_by_workflow(&self, workflow: &WorkflowId) -> Result<Vec<Issue>, IssueStoreError>;
}

// ============================================================================
// SECTION: Format Resolver
// ============================================================================

/// Lookup of formats identified upstream, keyed by package-relative path.
pub trait FormatResolver: Send + Sync {
    /// Returns the format recorded for a path using `/` separators.
    ///
    /// Absence of a match is not an error.
    fn format_for(&self, relative_path: &str) -> Option<FormatRef>;
}

impl FormatResolver for BTreeMap<String, FormatRef> {
    fn format_for(&self, relative_path: &str) -> Option<FormatRef> {
        self.get(relative_path).cloned()
    }
}

/// Resolver used when no format identification ran.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFormats;

impl FormatResolver for NoFormats {
    fn format_for(&self, _relative_path: &str) -> Option<FormatRef> {
        None
    }
}

// ============================================================================
// SECTION: Index Notifier
// ============================================================================

/// Search index notification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The index rejected or failed the request.
    #[error("index error: {0}")]
    Index(String),
}

/// Notifies the search index of workflow state changes.
pub trait IndexNotifier: Send + Sync {
    /// Removes the index entry of a workflow run.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index update fails.
    fn remove_entry(&self, workflow: &WorkflowId) -> Result<(), IndexError>;
}

// ============================================================================
// SECTION: Object State Store
// ============================================================================

/// Stored object record errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectStoreError {
    /// Store I/O error.
    #[error("object store io error: {0}")]
    Io(String),
    /// Stored data is invalid.
    #[error("object store invalid data: {0}")]
    Invalid(String),
}

/// Local records of remote stored objects.
pub trait ObjectStateStore: Send + Sync {
    /// Inserts or replaces the record for `(object.id, object.kind)`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when saving fails.
    fn save_object(&self, object: &StoredObject) -> Result<(), ObjectStoreError>;

    /// Loads the record for a package and kind.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when loading fails.
    fn find_object(
        &self,
        id: &PackageId,
        kind: ObjectKind,
    ) -> Result<Option<StoredObject>, ObjectStoreError>;
}

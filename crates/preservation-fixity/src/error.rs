// crates/preservation-fixity/src/error.rs
// ============================================================================
// Module: Fixity Errors
// Description: Error and fault types raised by fixity verification.
// Purpose: Separate local failures from workflow-facing policy faults.
// Dependencies: preservation-core, thiserror
// ============================================================================

//! ## Overview
//! [`FixityError`] covers failures reading manifests and package files.
//! [`FixityFault`] is what a fixity check raises to the workflow layer:
//! an escalation awaiting human resolution, a terminal abort, or one of the
//! underlying errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use preservation_core::DigestError;
use preservation_core::Issue;
use preservation_core::IssueStoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Fixity Errors
// ============================================================================

/// Errors raised while parsing manifests or reading package files.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixityError {
    /// Bad local input such as a missing manifest path.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Filesystem failure.
    #[error("fixity io error: {0}")]
    Io(String),
    /// Manifest XML is malformed.
    #[error("manifest xml error: {0}")]
    Xml(String),
    /// A required attribute is absent from a manifest element.
    #[error("manifest element {element} is missing attribute {attribute}")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: String,
    },
    /// No metadata file matched the supplied pattern.
    #[error("metadata file not found at path given by regex: {0}")]
    MetadataNotFound(String),
    /// More than one metadata file matched the supplied pattern.
    #[error("multiple files found at the path given by regex: {0}")]
    AmbiguousMetadata(String),
    /// A regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(String),
    /// The policy fragment holds an unusable value.
    #[error("invalid fixity config: {0}")]
    InvalidConfig(String),
    /// Digest computation failed.
    #[error("digest error: {0}")]
    Digest(String),
}

impl From<DigestError> for FixityError {
    fn from(err: DigestError) -> Self {
        match err {
            DigestError::InvalidArgument(message) => Self::InvalidArgument(message),
            DigestError::Io(message) => Self::Digest(message),
        }
    }
}

// ============================================================================
// SECTION: Workflow Faults
// ============================================================================

/// Faults a fixity check raises to the workflow layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixityFault {
    /// Policy is absent or invalid; the run must wait for human resolution.
    #[error("fixity check escalated with {} unresolved issue(s)", issues.len())]
    Escalation {
        /// Issues recorded for the escalated bucket.
        issues: Vec<Issue>,
    },
    /// Policy disables continuation; the run fails immediately.
    #[error("fixity check aborted: {message}")]
    Abort {
        /// Human-readable message listing the affected files.
        message: String,
    },
    /// Persisting issues failed.
    #[error("issue store error: {0}")]
    Store(String),
    /// Verification itself failed.
    #[error(transparent)]
    Fixity(#[from] FixityError),
}

impl From<IssueStoreError> for FixityFault {
    fn from(err: IssueStoreError) -> Self {
        Self::Store(err.to_string())
    }
}

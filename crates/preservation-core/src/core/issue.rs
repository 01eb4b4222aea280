// crates/preservation-core/src/core/issue.rs
// ============================================================================
// Module: Fixity Issues
// Description: Issue kinds and persisted issue records produced by fixity checks.
// Purpose: Provide the issue taxonomy shared by the policy engine and stores.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An [`Issue`] records one fixity deviation together with its policy
//! resolution. Issues are created by the policy engine only and are immutable
//! once stored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::FormatRef;
use crate::core::identifiers::ToolRef;
use crate::core::identifiers::WorkflowId;

// ============================================================================
// SECTION: Issue Kind
// ============================================================================

/// The three fixity issue kinds, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// A manifest names a checksum algorithm that is not supported.
    #[serde(rename = "FILE_UNSUPPORTED_CHECKSUM_TYPE")]
    UnsupportedChecksumType,
    /// A file referenced by a manifest does not exist.
    #[serde(rename = "FILE_MISSING")]
    MissingFile,
    /// A file exists but its digest differs from the declared one.
    #[serde(rename = "FILE_INVALID_CHECKSUM")]
    InvalidChecksum,
}

impl IssueKind {
    /// All kinds in evaluation order.
    pub const ALL: [Self; 3] = [Self::UnsupportedChecksumType, Self::MissingFile, Self::InvalidChecksum];

    /// Returns the stable issue code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnsupportedChecksumType => "FILE_UNSUPPORTED_CHECKSUM_TYPE",
            Self::MissingFile => "FILE_MISSING",
            Self::InvalidChecksum => "FILE_INVALID_CHECKSUM",
        }
    }

    /// Returns the policy option name consulted for this kind.
    #[must_use]
    pub const fn config_option(self) -> &'static str {
        match self {
            Self::UnsupportedChecksumType => "continueOnUnsupportedChecksumType",
            Self::MissingFile => "continueOnMissingFiles",
            Self::InvalidChecksum => "continueOnInvalidChecksums",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when an issue code is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown issue code: {0}")]
pub struct UnknownIssueCode(pub String);

impl FromStr for IssueKind {
    type Err = UnknownIssueCode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == value)
            .ok_or_else(|| UnknownIssueCode(value.to_string()))
    }
}

// ============================================================================
// SECTION: Issue
// ============================================================================

/// A persisted fixity issue.
///
/// # Invariants
/// - `resolved_by_config` is true only when the policy option held a boolean.
/// - `description` names the manifest the issue was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Workflow run the issue belongs to.
    pub workflow: WorkflowId,
    /// Tool that detected the issue.
    pub tool: ToolRef,
    /// Issue kind.
    pub kind: IssueKind,
    /// Format identified upstream for the affected file, if any.
    pub related_format: Option<FormatRef>,
    /// Human-readable description including the policy note.
    pub description: String,
    /// Whether configuration resolved the issue without human input.
    pub resolved_by_config: bool,
}

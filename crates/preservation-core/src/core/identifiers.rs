// crates/preservation-core/src/core/identifiers.rs
// ============================================================================
// Module: Preservation Identifiers
// Description: Canonical opaque identifiers for packages, workflows, and tools.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout the preservation core.
//! Identifiers are opaque UTF-8 strings and serialize transparently on the wire.
//! No normalization is applied; callers supply the values assigned upstream
//! (ingest workflow external ids, SIP ids, tool name/version pairs).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of a submitted package (SIP) and of its archived form (AIP).
///
/// # Invariants
/// - Opaque UTF-8 string; the archival storage uses the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Creates a new package identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PackageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// External identifier of a single ingest workflow run.
///
/// # Invariants
/// - Opaque UTF-8 string; also names the per-run workspace directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Creates a new workflow identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to the ingest tool that produced an issue.
///
/// # Invariants
/// - `name` and `version` are opaque; an empty version is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolRef {
    /// Tool name.
    pub name: String,
    /// Tool version.
    pub version: String,
}

impl ToolRef {
    /// Creates a new tool reference.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            return self.name.fmt(f);
        }
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Reference to a format definition resolved by upstream identification.
///
/// # Invariants
/// - `puid` is a PRONOM unique identifier (for example `fmt/43`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatRef {
    /// PRONOM unique identifier.
    pub puid: String,
}

impl FormatRef {
    /// Creates a new format reference from a PUID.
    #[must_use]
    pub fn new(puid: impl Into<String>) -> Self {
        Self {
            puid: puid.into(),
        }
    }
}

impl fmt::Display for FormatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.puid.fmt(f)
    }
}

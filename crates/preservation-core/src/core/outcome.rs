// crates/preservation-core/src/core/outcome.rs
// ============================================================================
// Module: Verification Outcome
// Description: Bucketed results of a single fixity verification pass.
// Purpose: Carry unsupported, missing, and invalid findings to the policy engine.
// Dependencies: indexmap, serde
// ============================================================================

//! ## Overview
//! A [`VerificationOutcome`] holds three disjoint buckets. Each finding keeps
//! the manifest it came from so issue descriptions can name their source.
//!
//! Invariants:
//! - A path recorded as unsupported is never checked for existence or digest.
//! - Buckets preserve manifest order; unsupported findings are grouped by the
//!   literal algorithm string, groups in first-seen order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Findings
// ============================================================================

/// One file flagged during verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixityFinding {
    /// Manifest file the entry was declared in.
    pub manifest: PathBuf,
    /// Absolute, normalized path of the referenced file.
    pub path: PathBuf,
}

impl FixityFinding {
    /// Creates a finding.
    #[must_use]
    pub fn new(manifest: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            path: path.into(),
        }
    }
}

/// Bucketed findings of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Findings whose algorithm is unsupported, keyed by literal algorithm string.
    pub unsupported: IndexMap<String, Vec<FixityFinding>>,
    /// Findings whose file does not exist.
    pub missing: Vec<FixityFinding>,
    /// Findings whose digest does not match.
    pub invalid: Vec<FixityFinding>,
}

impl VerificationOutcome {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unsupported-algorithm finding.
    pub fn record_unsupported(&mut self, algorithm: impl Into<String>, finding: FixityFinding) {
        self.unsupported.entry(algorithm.into()).or_default().push(finding);
    }

    /// Records a missing-file finding.
    pub fn record_missing(&mut self, finding: FixityFinding) {
        self.missing.push(finding);
    }

    /// Records an invalid-checksum finding.
    pub fn record_invalid(&mut self, finding: FixityFinding) {
        self.invalid.push(finding);
    }

    /// Returns true when all buckets are empty.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unsupported.is_empty() && self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Returns the number of findings across all buckets.
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.unsupported.values().map(Vec::len).sum::<usize>()
            + self.missing.len()
            + self.invalid.len()
    }

    /// Returns true when the path appears in the missing bucket.
    #[must_use]
    pub fn is_missing(&self, path: &Path) -> bool {
        self.missing.iter().any(|finding| finding.path == path)
    }

    /// Returns true when the path appears in the invalid bucket.
    #[must_use]
    pub fn is_invalid(&self, path: &Path) -> bool {
        self.invalid.iter().any(|finding| finding.path == path)
    }

    /// Returns the algorithm a path was recorded as unsupported under, if any.
    #[must_use]
    pub fn unsupported_algorithm(&self, path: &Path) -> Option<&str> {
        self.unsupported.iter().find_map(|(algorithm, findings)| {
            findings.iter().any(|finding| finding.path == path).then_some(algorithm.as_str())
        })
    }
}
